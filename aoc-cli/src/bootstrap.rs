//! Wires the static tables, the built-in mock adapters, and one
//! `AuditCoordinator` the way every `miesc` subcommand needs it.

use aoc_adapters::{AderynEqAdapter, MythrilEqAdapter, SlitherEqAdapter};
use aoc_bus::ContextBus;
use aoc_core::{AocConfig, CorrelationConfig};
use aoc_coordinator::{AuditCoordinator, StaticTables};
use aoc_observability::MetricsCollector;
use aoc_registry::ToolRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn resolve(data_dir: &Path, configured: &Option<String>, filename: &str) -> PathBuf {
    configured
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join(filename))
}

pub fn load_tables(
    data_dir: &Path,
    correlation: &CorrelationConfig,
) -> anyhow::Result<StaticTables> {
    let taxonomy_path = resolve(data_dir, &correlation.taxonomy_map_path, "taxonomy_map.json");
    let fp_priors_path = resolve(data_dir, &correlation.fp_priors_path, "fp_priors.json");
    let compliance_path =
        resolve(data_dir, &correlation.compliance_map_path, "compliance_map.json");
    let severity_path = data_dir.join("severity_map.json");

    Ok(StaticTables {
        taxonomy_map: aoc_core::load_taxonomy_map(&taxonomy_path)?,
        severity_map: aoc_core::load_severity_map(&severity_path)?,
        fp_priors: aoc_core::load_fp_priors(&fp_priors_path)?,
        compliance_map: aoc_core::load_compliance_map(&compliance_path)?,
    })
}

/// Registers the three built-in mock adapters (spec §9: real `slither`/
/// `mythril`/`aderyn` subprocess adapters are out of this implementation's
/// scope; the deterministic equivalents stand in, wired through the exact
/// same `ToolAdapter` seam a real adapter would use).
fn build_registry() -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(SlitherEqAdapter), false).expect("built-in id collision");
    registry.register(Arc::new(MythrilEqAdapter), false).expect("built-in id collision");
    registry.register(Arc::new(AderynEqAdapter), false).expect("built-in id collision");
    registry
}

pub fn build_coordinator(config: AocConfig, tables: StaticTables) -> AuditCoordinator {
    let registry = build_registry();
    let bus = Arc::new(ContextBus::new(
        config.bus.subscriber_buffer,
        config.bus.subscriber_buffer,
    ));
    let metrics = Arc::new(MetricsCollector::new());
    AuditCoordinator::new(registry, bus, metrics, config, tables)
}
