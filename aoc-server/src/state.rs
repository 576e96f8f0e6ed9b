//! Shared state handed to every axum handler (spec §4.8), mirroring the
//! agency's `ServerConfig` + `Extension<Arc<_>>` convention
//! (`agent-mcp/src/lib.rs`): one owning struct, cloned cheaply per request.

use aoc_coordinator::AuditCoordinator;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct ServerState {
    pub coordinator: Arc<AuditCoordinator>,
    pub max_contract_bytes: usize,
    pub max_concurrent_audits: usize,
    started_at: Arc<Instant>,
}

impl ServerState {
    pub fn new(
        coordinator: Arc<AuditCoordinator>,
        max_contract_bytes: usize,
        max_concurrent_audits: usize,
    ) -> Self {
        Self {
            coordinator,
            max_contract_bytes,
            max_concurrent_audits,
            started_at: Arc::new(Instant::now()),
        }
    }

    pub fn uptime_s(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
