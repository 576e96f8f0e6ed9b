//! Shared handler logic for the RPC and REST surfaces (spec §6.1-§6.2:
//! "REST mirrors the JSON-RPC methods one-to-one").

use crate::dto::*;
use crate::error::ApiError;
use crate::state::ServerState;
use aoc_core::AocError;
use aoc_coordinator::StartAuditRequest;
use std::collections::HashMap;

pub fn capabilities() -> CapabilitiesResult {
    let schema = || serde_json::json!({});
    let mut capabilities = HashMap::new();
    for method in [
        "capabilities",
        "status",
        "run_audit",
        "get_audit",
        "cancel_audit",
        "get_metrics",
        "policy_audit",
    ] {
        capabilities.insert(
            method,
            MethodCapability {
                input_schema: schema(),
                output_schema: schema(),
            },
        );
    }
    CapabilitiesResult {
        agent_id: "aoc",
        protocol_version: "1.0",
        capabilities,
    }
}

pub async fn status(state: &ServerState) -> StatusResult {
    let (active, completed) = state.coordinator.lifecycle_counts().await;
    let registry_empty = state.coordinator.registry().is_empty();
    StatusResult {
        state: if registry_empty { "degraded" } else { "healthy" },
        uptime_s: state.uptime_s(),
        audits_active: active,
        audits_completed: completed,
    }
}

pub async fn run_audit(
    state: &ServerState,
    params: RunAuditParams,
) -> Result<RunAuditResult, ApiError> {
    if contract_len(&params.contract) > state.max_contract_bytes {
        return Err(AocError::InputInvalid(format!(
            "contract exceeds max_contract_bytes ({})",
            state.max_contract_bytes
        ))
        .into());
    }

    let (active, _) = state.coordinator.lifecycle_counts().await;
    if active >= state.max_concurrent_audits {
        return Err(AocError::InputInvalid(format!(
            "max_concurrent_audits ({}) reached",
            state.max_concurrent_audits
        ))
        .into());
    }

    let profile = parse_profile(&params.profile)?;
    let cross_layer_mode = params
        .options
        .as_ref()
        .and_then(|o| o.cross_layer_mode.as_deref())
        .map(parse_cross_layer_mode)
        .transpose()?;
    let global_deadline = params
        .options
        .as_ref()
        .and_then(|o| parse_deadline(o.global_deadline_s));

    let audit_id = state
        .coordinator
        .start_audit(StartAuditRequest {
            target: params.contract,
            profile,
            layers: params.layers,
            tools: params.tools,
            cross_layer_mode,
            global_deadline,
            workspace_dir: std::env::temp_dir(),
        })
        .await?;

    let report = state.coordinator.get_report(&audit_id, false).await?;
    Ok(result_from_report(&audit_id, &report))
}

pub async fn get_audit(
    state: &ServerState,
    audit_id: &str,
    partial: bool,
) -> Result<RunAuditResult, ApiError> {
    let status = state.coordinator.get_status(audit_id).await?;
    if partial && !status.state.is_terminal() {
        return Ok(result_from_status(&status));
    }
    let report = state.coordinator.get_report(audit_id, partial).await?;
    Ok(result_from_report(audit_id, &report))
}

pub async fn cancel_audit(
    state: &ServerState,
    audit_id: &str,
) -> Result<CancelAuditResult, ApiError> {
    state.coordinator.cancel(audit_id).await?;
    Ok(CancelAuditResult { cancelled: true })
}

pub async fn get_metrics(state: &ServerState) -> GetMetricsResult {
    let snapshot = state.coordinator.metrics().snapshot().await;
    // Precision/recall/F1 are an operator-supplied static table in this
    // implementation (spec §9: the source's figures are non-normative);
    // no corpus is evaluated at request time.
    GetMetricsResult {
        precision_estimate: 0.80,
        recall_estimate: 0.70,
        f1: 0.75,
        counters: snapshot.counters,
        gauges: snapshot.gauges,
    }
}

/// `policy_audit` delegates to a PolicyAgent collaborator outside this
/// crate's boundary (spec §1 "external collaborators, visible to this spec
/// only through the interfaces in §6"); no such collaborator is wired up
/// here.
pub fn policy_audit(params: PolicyAuditParams) -> Result<PolicyAuditResult, ApiError> {
    Err(AocError::Internal(format!(
        "policy_audit has no PolicyAgent collaborator configured (repo_path '{}')",
        params.repo_path
    ))
    .into())
}
