//! Request/response bodies shared between the JSON-RPC and REST surfaces
//! (spec §6.1-§6.2: "REST mirrors the JSON-RPC methods one-to-one").

use aoc_core::{AocError, AocResult, AuditState, ContractRef, CrossLayerMode, Profile};
use aoc_coordinator::report::AuditReport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct RunAuditOptions {
    pub cross_layer_mode: Option<String>,
    pub global_deadline_s: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RunAuditParams {
    pub contract: ContractRef,
    pub profile: String,
    pub tools: Option<Vec<String>>,
    pub layers: Option<Vec<u8>>,
    pub options: Option<RunAuditOptions>,
}

pub fn parse_profile(raw: &str) -> AocResult<Profile> {
    match raw.to_ascii_lowercase().as_str() {
        "quick" => Ok(Profile::Quick),
        "standard" => Ok(Profile::Standard),
        "full" => Ok(Profile::Full),
        "custom" => Ok(Profile::Custom),
        other => Err(AocError::InputInvalid(format!("unknown profile '{other}'"))),
    }
}

pub fn parse_cross_layer_mode(raw: &str) -> AocResult<CrossLayerMode> {
    match raw.to_ascii_lowercase().as_str() {
        "sequential" => Ok(CrossLayerMode::Sequential),
        "pipelined" => Ok(CrossLayerMode::Pipelined),
        other => Err(AocError::InputInvalid(format!(
            "unknown cross_layer_mode '{other}'"
        ))),
    }
}

/// Rough byte size of a contract reference, for the `max_contract_bytes`
/// cap (spec §4.8). A path target is sized after the caller provides it;
/// here we only size what the request body itself carries.
pub fn contract_len(contract: &ContractRef) -> usize {
    match contract {
        ContractRef::Path(p) => p.len(),
        ContractRef::Inline { source, .. } => source.len(),
    }
}

#[derive(Debug, Serialize)]
pub struct RunAuditSummary {
    pub counts_by_severity: HashMap<String, u32>,
}

#[derive(Debug, Serialize)]
pub struct RunAuditMetadata {
    pub tools_used: Vec<String>,
    pub duration_s: f64,
    pub partial_timeout: bool,
}

/// `run_audit`/`get_audit` result shape (spec §6.1).
#[derive(Debug, Serialize)]
pub struct RunAuditResult {
    pub audit_id: String,
    pub state: AuditState,
    pub summary: RunAuditSummary,
    pub findings: Vec<aoc_core::CorrelatedFinding>,
    pub metadata: RunAuditMetadata,
}

pub fn result_from_report(audit_id: &str, report: &AuditReport) -> RunAuditResult {
    RunAuditResult {
        audit_id: audit_id.to_string(),
        state: match report.status {
            aoc_core::ReportStatus::Ok => AuditState::Completed,
            aoc_core::ReportStatus::PartialTimeout => AuditState::Completed,
            aoc_core::ReportStatus::Cancelled => AuditState::Cancelled,
            aoc_core::ReportStatus::Failed => AuditState::Failed,
        },
        summary: RunAuditSummary {
            counts_by_severity: report
                .counts_by_severity
                .iter()
                .map(|(k, v)| (format!("{k:?}").to_uppercase(), *v))
                .collect(),
        },
        findings: report.findings.iter().map(|f| f.finding.clone()).collect(),
        metadata: RunAuditMetadata {
            tools_used: report.tools_used.clone(),
            duration_s: report.duration_s,
            partial_timeout: report.partial_timeout,
        },
    }
}

/// An in-progress view for `get_audit(partial=true)`: the coordinator does
/// not model partial correlated results mid-flight (see
/// `AuditCoordinator::get_report`), so a partial request before completion
/// returns status/counters only, with an empty `findings` list.
pub fn result_from_status(status: &aoc_coordinator::AuditStatusView) -> RunAuditResult {
    RunAuditResult {
        audit_id: status.audit_id.clone(),
        state: status.state,
        summary: RunAuditSummary {
            counts_by_severity: HashMap::new(),
        },
        findings: Vec::new(),
        metadata: RunAuditMetadata {
            tools_used: Vec::new(),
            duration_s: 0.0,
            partial_timeout: false,
        },
    }
}

pub fn parse_deadline(secs: Option<u64>) -> Option<Duration> {
    secs.map(Duration::from_secs)
}

#[derive(Debug, Serialize)]
pub struct CancelAuditResult {
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResult {
    pub state: &'static str,
    pub uptime_s: f64,
    pub audits_active: usize,
    pub audits_completed: usize,
}

#[derive(Debug, Serialize)]
pub struct GetMetricsResult {
    pub precision_estimate: f64,
    pub recall_estimate: f64,
    pub f1: f64,
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct MethodCapability {
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesResult {
    pub agent_id: &'static str,
    pub protocol_version: &'static str,
    pub capabilities: HashMap<&'static str, MethodCapability>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyAuditParams {
    pub repo_path: String,
}

#[derive(Debug, Serialize)]
pub struct PolicyAuditResult {
    pub compliance_score: f64,
    pub checks: Vec<serde_json::Value>,
}
