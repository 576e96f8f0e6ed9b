//! Maps `AocError` onto HTTP status codes for the REST surface and onto
//! JSON-RPC error codes for the RPC surface (spec §7).

use aoc_core::AocError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError(pub AocError);

impl From<AocError> for ApiError {
    fn from(err: AocError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AocError::InputInvalid(_) => StatusCode::BAD_REQUEST,
            AocError::RegistryConflict(_) => StatusCode::CONFLICT,
            AocError::ToolUnavailable(..) => StatusCode::SERVICE_UNAVAILABLE,
            AocError::AuditCancelled(_) => StatusCode::CONFLICT,
            AocError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON-RPC 2.0 error code (spec §6.1 "All methods carry a JSON-RPC
    /// envelope"). Mirrors the conventional ranges: -32602 invalid params,
    /// -32000 server error.
    pub fn rpc_code(&self) -> i64 {
        match &self.0 {
            AocError::InputInvalid(_) => -32602,
            _ => -32000,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
