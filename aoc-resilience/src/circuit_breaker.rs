//! Circuit breaker for per-tool resilience (spec §4.4: repeated transient
//! failures of one adapter must not burn the global time budget).
//!
//! States:
//! - CLOSED: normal operation
//! - OPEN: failing, reject all requests until `reset_timeout` elapses
//! - HALF_OPEN: probing whether the tool has recovered

use aoc_core::{AocError, AocResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::SystemTime;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub tool_id: String,
    pub failure_threshold: u64,
    pub success_threshold: u64,
    pub reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    pub fn for_tool(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            failure_threshold: 3,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
    pub total_requests: u64,
    pub last_failure: Option<SystemTime>,
}

/// One breaker instance per registered tool (spec §4.3: adapters are
/// isolated from each other's failures).
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8, // 0=Closed, 1=Open, 2=HalfOpen
    failure_count: AtomicU64,
    success_count: AtomicU64,
    total_requests: AtomicU64,
    next_attempt: RwLock<Instant>,
    last_failure: RwLock<Option<SystemTime>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            next_attempt: RwLock::new(Instant::now()),
            last_failure: RwLock::new(None),
            state: AtomicU8::new(0),
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::Relaxed) {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Runs `op` if the circuit allows it, returning
    /// `AocError::ToolUnavailable` when it is open and still within its
    /// timeout window. Does not itself apply a deadline; the scheduler
    /// wraps the call in `tokio::time::timeout` separately (spec §4.4).
    pub async fn call<F, Fut, T>(&self, op: F) -> AocResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AocResult<T>>,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if self.state() == CircuitState::Open {
            let next_attempt = *self.next_attempt.read().await;
            if Instant::now() < next_attempt {
                return Err(AocError::ToolUnavailable(
                    self.config.tool_id.clone(),
                    "circuit breaker open".to_string(),
                ));
            }
            self.state.store(2, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
        }

        match op().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure().await;
                Err(err)
            }
        }
    }

    async fn on_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);

        if self.state() == CircuitState::HalfOpen {
            let successes = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
            if successes >= self.config.success_threshold {
                self.state.store(0, Ordering::Relaxed);
                self.success_count.store(0, Ordering::Relaxed);
                info!(tool_id = %self.config.tool_id, "circuit breaker closed");
            }
        }
    }

    async fn on_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_failure.write().await = Some(SystemTime::now());

        if self.state() == CircuitState::HalfOpen || failures >= self.config.failure_threshold {
            self.state.store(1, Ordering::Relaxed);
            *self.next_attempt.write().await = Instant::now() + self.config.reset_timeout;
            self.success_count.store(0, Ordering::Relaxed);
            warn!(tool_id = %self.config.tool_id, failures, "circuit breaker opened");
        }
    }

    pub async fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state(),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            last_failure: *self.last_failure.read().await,
        }
    }

    pub async fn reset(&self) {
        self.state.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.success_count.store(0, Ordering::Relaxed);
        *self.last_failure.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..CircuitBreakerConfig::for_tool("slither-eq")
        });

        for _ in 0..2 {
            let _ = cb
                .call(|| async { Err::<(), _>(AocError::Internal("boom".into())) })
                .await;
        }

        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_circuit_rejects_without_calling_op() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::for_tool("mythril-eq"));
        cb.state.store(1, Ordering::Relaxed);
        *cb.next_attempt.write().await = Instant::now() + Duration::from_secs(60);

        let result = cb.call(|| async { Ok::<_, AocError>(42) }).await;
        assert!(matches!(result, Err(AocError::ToolUnavailable(_, _))));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::for_tool("aderyn-eq"));
        let _ = cb
            .call(|| async { Err::<(), _>(AocError::Internal("x".into())) })
            .await;
        let _ = cb.call(|| async { Ok::<_, AocError>(()) }).await;
        assert_eq!(cb.stats().await.failure_count, 0);
    }
}
