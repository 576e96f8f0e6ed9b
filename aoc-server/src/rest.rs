//! REST mirror of the JSON-RPC methods (spec §6.2): GET for idempotent
//! queries, POST for audit creation/cancellation, same result bodies as
//! the RPC `result` objects.

use crate::dto::*;
use crate::error::ApiError;
use crate::handlers;
use crate::state::ServerState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

pub async fn get_capabilities() -> Json<CapabilitiesResult> {
    Json(handlers::capabilities())
}

pub async fn get_status(State(state): State<ServerState>) -> Json<StatusResult> {
    Json(handlers::status(&state).await)
}

pub async fn get_metrics(State(state): State<ServerState>) -> Json<GetMetricsResult> {
    Json(handlers::get_metrics(&state).await)
}

pub async fn post_run_audit(
    State(state): State<ServerState>,
    Json(params): Json<RunAuditParams>,
) -> Result<Json<RunAuditResult>, ApiError> {
    Ok(Json(handlers::run_audit(&state, params).await?))
}

#[derive(Debug, Deserialize)]
pub struct GetAuditQuery {
    #[serde(default)]
    pub partial: bool,
}

pub async fn get_audit(
    State(state): State<ServerState>,
    Path(audit_id): Path<String>,
    Query(query): Query<GetAuditQuery>,
) -> Result<Json<RunAuditResult>, ApiError> {
    Ok(Json(
        handlers::get_audit(&state, &audit_id, query.partial).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct CancelAuditBody {
    pub audit_id: String,
}

pub async fn post_cancel_audit(
    State(state): State<ServerState>,
    Json(body): Json<CancelAuditBody>,
) -> Result<Json<CancelAuditResult>, ApiError> {
    Ok(Json(handlers::cancel_audit(&state, &body.audit_id).await?))
}
