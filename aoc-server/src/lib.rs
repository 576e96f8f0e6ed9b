//! The RPC/REST boundary (spec §4.8): JSON-RPC envelope, REST mirror, and
//! the bus event stream, all reading from one `AuditCoordinator`. Grounded
//! in the agency's `agent-mcp` server config shape and the v3
//! `api-server` bin's router/axum-serve convention
//! (`src/bin/api-server.rs`).

pub mod dto;
pub mod error;
pub mod events;
pub mod handlers;
pub mod rest;
pub mod rpc;
pub mod state;

use aoc_coordinator::AuditCoordinator;
use axum::routing::{get, post};
use axum::Router;
use state::ServerState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/rpc", post(rpc::handle_rpc))
        .route("/mcp/capabilities", get(rest::get_capabilities))
        .route("/mcp/status", get(rest::get_status))
        .route("/mcp/get_metrics", get(rest::get_metrics))
        .route("/mcp/run_audit", post(rest::post_run_audit))
        .route("/mcp/cancel_audit", post(rest::post_cancel_audit))
        .route("/mcp/audits/:audit_id", get(rest::get_audit))
        .route("/mcp/audits/:audit_id/events", get(events::subscribe))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves the router on `host:port`, running until the process
/// is terminated (spec §6.5 `server.host`/`server.port`).
pub async fn serve(
    coordinator: Arc<AuditCoordinator>,
    host: &str,
    port: u16,
    max_contract_bytes: usize,
    max_concurrent_audits: usize,
) -> anyhow::Result<()> {
    let state = ServerState::new(coordinator, max_contract_bytes, max_concurrent_audits);
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "aoc-server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
