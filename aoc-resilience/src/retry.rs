//! Single-retry policy for adapters that declare themselves
//! idempotent-retryable (spec §4.2: "the scheduler may retry up to 1 time
//! on TRANSIENT errors").

use aoc_core::{AocError, AocResult};
use rand::Rng;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            jitter_factor: 0.2,
        }
    }
}

fn jittered_delay(config: &RetryConfig) -> Duration {
    let jitter = rand::thread_rng().gen_range(0.0..config.jitter_factor);
    config.base_delay.mul_f64(1.0 + jitter)
}

/// Runs `op` once, and a second time only if the first attempt fails with
/// `AocError::ToolFailedTransient` and `retryable` is true. Any other
/// error, including a second transient failure, is returned as-is — the
/// spec caps retries at one (§4.2), it does not define a backoff ladder.
pub async fn run_with_single_retry<F, Fut, T>(
    _tool_id: &str,
    retryable: bool,
    config: &RetryConfig,
    op: F,
) -> AocResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AocResult<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(AocError::ToolFailedTransient(id, reason)) if retryable => {
            warn!(tool_id = %id, reason = %reason, "transient failure, retrying once");
            sleep(jittered_delay(config)).await;
            match op().await {
                Ok(value) => {
                    info!(tool_id = %id, "retry succeeded");
                    Ok(value)
                }
                Err(second) => Err(second),
            }
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_once_on_transient_when_retryable() {
        let attempts = AtomicU32::new(0);
        let result = run_with_single_retry(
            "slither-eq",
            true,
            &RetryConfig::default(),
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(AocError::ToolFailedTransient(
                        "slither-eq".into(),
                        "timeout".into(),
                    ))
                } else {
                    Ok(42)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_when_not_retryable() {
        let attempts = AtomicU32::new(0);
        let result: AocResult<i32> = run_with_single_retry(
            "slither-eq",
            false,
            &RetryConfig::default(),
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AocError::ToolFailedTransient(
                    "slither-eq".into(),
                    "timeout".into(),
                ))
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_failures_are_never_retried() {
        let attempts = AtomicU32::new(0);
        let result: AocResult<i32> = run_with_single_retry(
            "mythril-eq",
            true,
            &RetryConfig::default(),
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AocError::ToolFailedPermanent(
                    "mythril-eq".into(),
                    "bad config".into(),
                ))
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
