//! The Layered Scheduler (spec §4.4): runs an `AuditPlan`'s tools layer by
//! layer, bounding per-layer concurrency with a semaphore and the whole run
//! with a global deadline. Grounded in the agency's wave-based
//! `multimodal_scheduler` (`run_layer` → `join_all` bounded by a semaphore),
//! generalized from a fixed language-pass pipeline to arbitrary numbered
//! tool layers with a caller-chosen `sequential`/`pipelined` cross-layer mode.

use crate::runner::{run_adapter, RunOutcome};
use aoc_adapters::AnalyzeOptions;
use aoc_bus::ContextBus;
use aoc_core::{AocResult, AuditPlan, BusPayload, CancelSignal, ContractRef, CrossLayerMode, RawFinding};
use aoc_observability::MetricsCollector;
use aoc_registry::ToolRegistry;
use aoc_resilience::{CircuitBreaker, CircuitBreakerConfig};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::info;

/// Everything one audit run produces from the scheduling pass, before
/// correlation.
#[derive(Debug, Default)]
pub struct SchedulingOutcome {
    pub findings: Vec<RawFinding>,
    pub partial_timeout: bool,
    pub cancelled: bool,
}

/// Owns per-tool circuit breakers across the lifetime of one scheduler
/// instance, so repeated audits against the same registry share breaker
/// state (spec §4.4: breakers are per-tool, not per-audit).
pub struct LayeredScheduler {
    registry: Arc<ToolRegistry>,
    bus: Arc<ContextBus>,
    metrics: Arc<MetricsCollector>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl LayeredScheduler {
    pub fn new(registry: Arc<ToolRegistry>, bus: Arc<ContextBus>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            registry,
            bus,
            metrics,
            breakers: DashMap::new(),
        }
    }

    fn breaker_for(&self, tool_id: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(tool_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(CircuitBreakerConfig::for_tool(tool_id))))
            .clone()
    }

    /// Runs `plan` to completion (or to its global deadline, or to
    /// cancellation), returning every raw finding produced by a tool that
    /// finished within its budget. Each layer's findings are also pushed to
    /// `layer_tx`, best-effort, as soon as that layer completes, so a
    /// caller can normalize/correlate incrementally instead of waiting for
    /// the whole run (spec §4.6 step 7 "re-emitted as later witnesses
    /// arrive").
    pub async fn run(
        &self,
        plan: &AuditPlan,
        target: &ContractRef,
        workspace_dir: std::path::PathBuf,
        cancel: &CancelSignal,
        layer_tx: &tokio::sync::mpsc::UnboundedSender<Vec<RawFinding>>,
    ) -> AocResult<SchedulingOutcome> {
        let deadline_at = tokio::time::Instant::now() + plan.global_deadline;
        let mut outcome = SchedulingOutcome::default();

        let mut layers = plan.layers.clone();
        layers.sort_unstable();

        match plan.cross_layer_mode {
            CrossLayerMode::Sequential => {
                for layer in layers {
                    if cancel.is_cancelled() {
                        outcome.cancelled = true;
                        break;
                    }
                    if tokio::time::Instant::now() >= deadline_at {
                        self.skip_remaining_layer(plan, layer);
                        outcome.partial_timeout = true;
                        continue;
                    }
                    let remaining = deadline_at.saturating_duration_since(tokio::time::Instant::now());
                    let layer_findings = self
                        .run_layer(plan, layer, target, &workspace_dir, remaining, cancel)
                        .await;
                    let _ = layer_tx.send(layer_findings.clone());
                    outcome.findings.extend(layer_findings);
                }
            }
            CrossLayerMode::Pipelined => {
                let remaining = deadline_at.saturating_duration_since(tokio::time::Instant::now());
                let handles: Vec<_> = layers
                    .into_iter()
                    .map(|layer| {
                        let plan = plan.clone();
                        let target = target.clone();
                        let workspace_dir = workspace_dir.clone();
                        let cancel = cancel.clone();
                        async move { self.run_layer(&plan, layer, &target, &workspace_dir, remaining, &cancel).await }
                    })
                    .collect();
                let results = futures::future::join_all(handles).await;
                for layer_findings in results {
                    let _ = layer_tx.send(layer_findings.clone());
                    outcome.findings.extend(layer_findings);
                }
                outcome.cancelled = cancel.is_cancelled();
                outcome.partial_timeout = tokio::time::Instant::now() >= deadline_at;
            }
        }

        if outcome.partial_timeout {
            self.bus.publish(&plan.audit_id, BusPayload::AuditPartialTimeout);
        }

        Ok(outcome)
    }

    async fn run_layer(
        &self,
        plan: &AuditPlan,
        layer: u8,
        target: &ContractRef,
        workspace_dir: &std::path::Path,
        budget: Duration,
        cancel: &CancelSignal,
    ) -> Vec<RawFinding> {
        let Some(tool_ids) = plan.tools_by_layer.get(&layer) else {
            return Vec::new();
        };
        if tool_ids.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(plan.max_parallel_per_layer.max(1) as usize));
        let options = Arc::new(AnalyzeOptions {
            workspace_dir: workspace_dir.to_path_buf(),
            extra_args: Default::default(),
        });

        let tasks = tool_ids.iter().filter_map(|tool_id| {
            let adapter = self.registry.get(tool_id)?;
            let per_tool_deadline = plan
                .per_tool_deadlines
                .get(tool_id)
                .copied()
                .unwrap_or(budget)
                .min(budget);
            let breaker = self.breaker_for(tool_id);
            let semaphore = semaphore.clone();
            let options = options.clone();
            let bus = self.bus.clone();
            let metrics = self.metrics.clone();
            let cancel = cancel.clone();
            let audit_id = plan.audit_id.clone();
            let target = target.clone();

            Some(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                run_adapter(
                    &audit_id,
                    adapter,
                    &target,
                    &options,
                    per_tool_deadline,
                    &breaker,
                    &cancel,
                    &bus,
                    &metrics,
                )
                .await
            })
        });

        let results = futures::future::join_all(tasks).await;
        let finished = results.iter().filter(|(o, _)| *o == RunOutcome::Finished).count();
        info!(audit_id = %plan.audit_id, layer, finished, total = results.len(), "layer complete");

        self.bus.publish(
            &plan.audit_id,
            BusPayload::AuditProgress {
                tools_pending: 0,
                tools_running: 0,
                tools_finished: finished as u32,
            },
        );

        let findings: Vec<RawFinding> = results.into_iter().flat_map(|(_, findings)| findings).collect();
        for finding in &findings {
            self.bus.publish(
                &plan.audit_id,
                BusPayload::FindingRaw {
                    tool_id: finding.source_tool.clone(),
                },
            );
        }
        findings
    }

    /// Marks every tool in a not-yet-started layer as skipped once the
    /// global deadline has passed (spec §4.4: "remaining tools are reported
    /// TOOL_SKIPPED, not run").
    fn skip_remaining_layer(&self, plan: &AuditPlan, layer: u8) {
        let Some(tool_ids) = plan.tools_by_layer.get(&layer) else {
            return;
        };
        for tool_id in tool_ids {
            self.bus.publish(
                &plan.audit_id,
                BusPayload::ToolSkipped {
                    tool_id: tool_id.clone(),
                    reason: "global deadline reached before this layer could start".to_string(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_adapters::SlitherEqAdapter;
    use aoc_core::Profile;
    use std::collections::HashMap;

    fn sample_plan(mode: CrossLayerMode) -> AuditPlan {
        let mut tools_by_layer = HashMap::new();
        tools_by_layer.insert(1, vec!["slither-eq".to_string()]);
        AuditPlan {
            audit_id: "a1".to_string(),
            target: ContractRef::Inline {
                logical_id: "V".to_string(),
                source: "contract V { function f() external { msg.sender.call{value: 1}(\"\"); } }"
                    .to_string(),
            },
            profile: Profile::Quick,
            layers: vec![1],
            tools_by_layer,
            global_deadline: Duration::from_secs(10),
            per_tool_deadlines: HashMap::new(),
            max_parallel_per_layer: 4,
            cross_layer_mode: mode,
        }
    }

    #[tokio::test]
    async fn sequential_run_collects_findings_from_registered_tools() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(SlitherEqAdapter), false).unwrap();
        let bus = Arc::new(ContextBus::new(64, 256));
        let metrics = Arc::new(MetricsCollector::new());
        let scheduler = LayeredScheduler::new(registry, bus, metrics);
        let plan = sample_plan(CrossLayerMode::Sequential);
        let cancel = CancelSignal::new();
        let (layer_tx, mut layer_rx) = tokio::sync::mpsc::unbounded_channel();

        let outcome = scheduler
            .run(&plan, &plan.target.clone(), std::env::temp_dir(), &cancel, &layer_tx)
            .await
            .unwrap();

        assert_eq!(outcome.findings.len(), 1);
        assert!(!outcome.partial_timeout);
        assert!(!outcome.cancelled);

        let layer_batch = layer_rx.try_recv().unwrap();
        assert_eq!(layer_batch.len(), 1);
    }

    #[tokio::test]
    async fn unregistered_tool_is_silently_skipped_from_layer() {
        let registry = Arc::new(ToolRegistry::new());
        let bus = Arc::new(ContextBus::new(64, 256));
        let metrics = Arc::new(MetricsCollector::new());
        let scheduler = LayeredScheduler::new(registry, bus, metrics);
        let plan = sample_plan(CrossLayerMode::Sequential);
        let cancel = CancelSignal::new();
        let (layer_tx, _layer_rx) = tokio::sync::mpsc::unbounded_channel();

        let outcome = scheduler
            .run(&plan, &plan.target.clone(), std::env::temp_dir(), &cancel, &layer_tx)
            .await
            .unwrap();

        assert!(outcome.findings.is_empty());
    }
}
