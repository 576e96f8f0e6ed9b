//! JSON-RPC 2.0 dispatch over a single `POST /rpc` endpoint (spec §6.1).
//! One envelope type, one method-name `match`, same handlers the REST
//! surface calls directly — this crate has no separate "business logic"
//! layer, `rest.rs` and `rpc.rs` both call straight into `handlers.rs`.

use crate::dto::*;
use crate::handlers;
use crate::state::ServerState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    fn err(id: Option<Value>, api_err: crate::error::ApiError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code: api_err.rpc_code(),
                message: api_err.0.to_string(),
            }),
        }
    }
}

pub async fn handle_rpc(
    State(state): State<ServerState>,
    Json(request): Json<RpcRequest>,
) -> Json<RpcResponse> {
    let id = request.id.clone();
    let outcome = dispatch(&state, &request).await;
    Json(match outcome {
        Ok(value) => RpcResponse::ok(id, value),
        Err(err) => RpcResponse::err(id, err),
    })
}

async fn dispatch(
    state: &ServerState,
    request: &RpcRequest,
) -> Result<Value, crate::error::ApiError> {
    match request.method.as_str() {
        "capabilities" => Ok(serde_json::to_value(handlers::capabilities()).unwrap()),
        "status" => Ok(serde_json::to_value(handlers::status(state).await).unwrap()),
        "run_audit" => {
            let params: RunAuditParams = serde_json::from_value(request.params.clone())
                .map_err(|e| aoc_core::AocError::InputInvalid(e.to_string()))?;
            let result = handlers::run_audit(state, params).await?;
            Ok(serde_json::to_value(result).unwrap())
        }
        "get_audit" => {
            #[derive(Deserialize)]
            struct Params {
                audit_id: String,
                #[serde(default)]
                partial: bool,
            }
            let params: Params = serde_json::from_value(request.params.clone())
                .map_err(|e| aoc_core::AocError::InputInvalid(e.to_string()))?;
            let result = handlers::get_audit(state, &params.audit_id, params.partial).await?;
            Ok(serde_json::to_value(result).unwrap())
        }
        "cancel_audit" => {
            #[derive(Deserialize)]
            struct Params {
                audit_id: String,
            }
            let params: Params = serde_json::from_value(request.params.clone())
                .map_err(|e| aoc_core::AocError::InputInvalid(e.to_string()))?;
            let result = handlers::cancel_audit(state, &params.audit_id).await?;
            Ok(serde_json::to_value(result).unwrap())
        }
        "get_metrics" => {
            let result = handlers::get_metrics(state).await;
            Ok(serde_json::to_value(result).unwrap())
        }
        "policy_audit" => {
            let params: PolicyAuditParams = serde_json::from_value(request.params.clone())
                .map_err(|e| aoc_core::AocError::InputInvalid(e.to_string()))?;
            let result = handlers::policy_audit(params)?;
            Ok(serde_json::to_value(result).unwrap())
        }
        other => Err(aoc_core::AocError::InputInvalid(format!("unknown method '{other}'")).into()),
    }
}
