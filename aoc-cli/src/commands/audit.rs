//! `miesc audit <profile> <target>` / `miesc scan <target>` (spec §6.4).

use aoc_core::{BusPayload, ContractRef, Severity};
use aoc_coordinator::{AuditCoordinator, StartAuditRequest};
use std::collections::HashMap;
use std::path::PathBuf;

pub async fn run(
    coordinator: &AuditCoordinator,
    profile: &str,
    target: &str,
    output: Option<PathBuf>,
) -> anyhow::Result<u8> {
    let profile = aoc_server::dto::parse_profile(profile)?;
    let workspace_dir = output.clone().unwrap_or_else(|| std::env::current_dir().unwrap());

    let audit_id = coordinator
        .start_audit(StartAuditRequest {
            target: ContractRef::Path(target.to_string()),
            profile,
            layers: None,
            tools: None,
            cross_layer_mode: None,
            global_deadline: None,
            workspace_dir,
        })
        .await?;

    let report = coordinator.get_report(&audit_id, false).await?;

    if let Some(dir) = &output {
        persist_report(dir, &audit_id, &report, &coordinator.bus())?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    let has_high_or_critical = report
        .findings
        .iter()
        .any(|f| matches!(f.finding.severity_final, Severity::High | Severity::Critical));

    Ok(if has_high_or_critical { 1 } else { 0 })
}

/// Writes the `<audit_id>/` tree (spec §6.6) under `dir`: the plan as
/// emitted, normalized findings grouped by tool, the final correlated set,
/// the full bus event log, and the report itself. The plan and per-tool
/// findings are recovered from the retained bus log rather than threaded
/// through as extra arguments, since the bus is already the audit's
/// single source of truth for everything that happened before the report
/// was built.
fn persist_report(
    dir: &std::path::Path,
    audit_id: &str,
    report: &aoc_coordinator::report::AuditReport,
    bus: &aoc_bus::ContextBus,
) -> anyhow::Result<()> {
    let audit_dir = dir.join(audit_id);
    std::fs::create_dir_all(&audit_dir)?;

    if let Some(plan_event) = bus.replay(audit_id, Some(&["plan.created"])).first() {
        if let BusPayload::PlanCreated { plan } = &plan_event.payload {
            std::fs::write(audit_dir.join("plan.json"), serde_json::to_vec_pretty(plan)?)?;
        }
    }

    let findings_dir = audit_dir.join("findings");
    let mut per_tool: HashMap<String, Vec<&aoc_core::Finding>> = HashMap::new();
    let normalized_events = bus.replay(audit_id, Some(&["finding.normalized"]));
    for event in &normalized_events {
        if let BusPayload::FindingNormalized { finding } = &event.payload {
            per_tool.entry(finding.source_tool.clone()).or_default().push(finding);
        }
    }
    for (tool_id, findings) in &per_tool {
        let tool_dir = findings_dir.join(tool_id);
        std::fs::create_dir_all(&tool_dir)?;
        for (index, finding) in findings.iter().enumerate() {
            std::fs::write(
                tool_dir.join(format!("{index}.json")),
                serde_json::to_vec_pretty(finding)?,
            )?;
        }
    }

    let correlated: Vec<&aoc_core::CorrelatedFinding> =
        report.findings.iter().map(|f| &f.finding).collect();
    std::fs::write(
        audit_dir.join("correlated.json"),
        serde_json::to_vec_pretty(&correlated)?,
    )?;

    let mut events_ndjson = String::new();
    for event in bus.replay(audit_id, None) {
        events_ndjson.push_str(&serde_json::to_string(&event)?);
        events_ndjson.push('\n');
    }
    std::fs::write(audit_dir.join("events.ndjson"), events_ndjson)?;

    std::fs::write(
        audit_dir.join("summary.json"),
        serde_json::to_vec_pretty(report)?,
    )?;
    Ok(())
}
