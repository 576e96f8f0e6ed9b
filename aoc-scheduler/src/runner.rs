//! The Adapter Runner (spec §4.4): executes one tool's `analyze` call under
//! a bounded time budget, a circuit breaker, and the single-retry policy,
//! and turns the outcome into bus events. Grounded in the agency's
//! `WorkerPoolManager::execute_task` — a deadline-wrapped, circuit-breaker-
//! guarded single unit of work — generalized from a fixed worker-task shape
//! to an arbitrary `ToolAdapter`.

use aoc_adapters::{AnalyzeOptions, ToolAdapter};
use aoc_bus::ContextBus;
use aoc_core::{AocError, AocResult, CancelSignal, ContractRef, RawFinding};
use aoc_observability::MetricsCollector;
use aoc_resilience::{run_with_single_retry, CircuitBreaker, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What happened to one tool invocation, beyond the findings it produced.
/// The scheduler uses this to decide whether a layer's completion should be
/// reported as clean or degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    TimedOut,
    FailedTransient,
    FailedPermanent,
    Cancelled,
}

/// Runs one adapter to completion, under `deadline`, publishing
/// `tool.started`/`tool.finished`/`tool.failed`/`tool.timeout` on `bus` as it
/// goes. Never panics; every adapter failure mode is captured and reported
/// rather than propagated, since one tool's failure must not abort an audit
/// (spec §4.4 "Tool-level failures are always recovered locally").
pub async fn run_adapter(
    audit_id: &str,
    adapter: Arc<dyn ToolAdapter>,
    target: &ContractRef,
    options: &AnalyzeOptions,
    deadline: Duration,
    breaker: &CircuitBreaker,
    cancel: &CancelSignal,
    bus: &ContextBus,
    metrics: &MetricsCollector,
) -> (RunOutcome, Vec<RawFinding>) {
    let metadata = adapter.metadata();
    let tool_id = metadata.id.clone();
    let layer = metadata.layer;

    let (findings_tx, mut findings_rx) = tokio::sync::mpsc::unbounded_channel();
    let emit = aoc_adapters::FindingSink::new(findings_tx);

    bus.publish(
        audit_id,
        aoc_core::BusPayload::ToolStarted {
            tool_id: tool_id.clone(),
            layer,
        },
    );

    if cancel.is_cancelled() {
        bus.publish(
            audit_id,
            aoc_core::BusPayload::ToolSkipped {
                tool_id: tool_id.clone(),
                reason: "audit cancelled before tool could start".to_string(),
            },
        );
        return (RunOutcome::Cancelled, Vec::new());
    }

    let started = tokio::time::Instant::now();
    let retry_config = RetryConfig::default();
    let retryable = metadata.idempotent_retryable;

    let analyze = || async {
        breaker
            .call(|| {
                run_with_single_retry(&tool_id, retryable, &retry_config, || {
                    adapter.analyze(target, options, cancel, &emit)
                })
            })
            .await
    };

    let raced = tokio::select! {
        result = tokio::time::timeout(deadline, analyze()) => result,
        _ = cancel.cancelled() => {
            bus.publish(
                audit_id,
                aoc_core::BusPayload::ToolSkipped {
                    tool_id: tool_id.clone(),
                    reason: "audit cancelled during analysis".to_string(),
                },
            );
            metrics.record_tool_run(&tool_id, started.elapsed().as_millis() as f64, "cancelled").await;
            return (RunOutcome::Cancelled, Vec::new());
        }
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;

    match raced {
        Err(_elapsed) => {
            let mut partial = Vec::new();
            while let Ok(finding) = findings_rx.try_recv() {
                partial.push(finding);
            }
            bus.publish(
                audit_id,
                aoc_core::BusPayload::ToolTimeout {
                    tool_id: tool_id.clone(),
                    after_ms: elapsed_ms,
                },
            );
            metrics.record_tool_run(&tool_id, elapsed_ms as f64, "timeout").await;
            warn!(audit_id, tool_id = %tool_id, elapsed_ms, partial_findings = partial.len(), "tool timed out");
            (RunOutcome::TimedOut, partial)
        }
        Ok(Ok(raw_output)) => {
            let raw_findings = adapter.normalize(raw_output);
            bus.publish(
                audit_id,
                aoc_core::BusPayload::ToolFinished {
                    tool_id: tool_id.clone(),
                    layer,
                    finding_count: raw_findings.len(),
                },
            );
            metrics.record_tool_run(&tool_id, elapsed_ms as f64, "ok").await;
            info!(audit_id, tool_id = %tool_id, findings = raw_findings.len(), "tool finished");
            (RunOutcome::Finished, raw_findings)
        }
        Ok(Err(err)) => {
            let transient = matches!(
                err,
                AocError::ToolFailedTransient(_, _) | AocError::ToolUnavailable(_, _)
            );
            bus.publish(
                audit_id,
                aoc_core::BusPayload::ToolFailed {
                    tool_id: tool_id.clone(),
                    transient,
                    error: err.to_string(),
                },
            );
            let outcome_label = if transient { "failed_transient" } else { "failed_permanent" };
            metrics.record_tool_run(&tool_id, elapsed_ms as f64, outcome_label).await;
            warn!(audit_id, tool_id = %tool_id, error = %err, "tool failed");
            let outcome = if transient {
                RunOutcome::FailedTransient
            } else {
                RunOutcome::FailedPermanent
            };
            (outcome, Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_adapters::SlitherEqAdapter;
    use aoc_resilience::CircuitBreakerConfig;
    use std::path::PathBuf;

    fn opts() -> AnalyzeOptions {
        AnalyzeOptions {
            workspace_dir: PathBuf::from("/tmp"),
            extra_args: Default::default(),
        }
    }

    #[tokio::test]
    async fn successful_run_publishes_finished_event() {
        let bus = ContextBus::new(16, 64);
        let mut sub = bus.subscribe(Some("a1".to_string()), None);
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::for_tool("slither-eq"));
        let metrics = MetricsCollector::new();
        let cancel = CancelSignal::new();
        let target = ContractRef::Inline {
            logical_id: "V".to_string(),
            source: "contract V { function f() external { msg.sender.call{value: 1}(\"\"); } }"
                .to_string(),
        };

        let (outcome, findings) = run_adapter(
            "a1",
            Arc::new(SlitherEqAdapter),
            &target,
            &opts(),
            Duration::from_secs(5),
            &breaker,
            &cancel,
            &bus,
            &metrics,
        )
        .await;

        assert_eq!(outcome, RunOutcome::Finished);
        assert_eq!(findings.len(), 1);

        let started = sub.receiver.recv().await.unwrap();
        assert_eq!(started.topic(), "tool.started");
        let finished = sub.receiver.recv().await.unwrap();
        assert_eq!(finished.topic(), "tool.finished");
    }

    #[tokio::test]
    async fn already_cancelled_skips_without_calling_adapter() {
        let bus = ContextBus::new(16, 64);
        let mut sub = bus.subscribe(Some("a1".to_string()), None);
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::for_tool("slither-eq"));
        let metrics = MetricsCollector::new();
        let cancel = CancelSignal::new();
        cancel.cancel();
        let target = ContractRef::Inline {
            logical_id: "V".to_string(),
            source: String::new(),
        };

        let (outcome, findings) = run_adapter(
            "a1",
            Arc::new(SlitherEqAdapter),
            &target,
            &opts(),
            Duration::from_secs(5),
            &breaker,
            &cancel,
            &bus,
            &metrics,
        )
        .await;

        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(findings.is_empty());
        let started = sub.receiver.recv().await.unwrap();
        assert_eq!(started.topic(), "tool.started");
        let skipped = sub.receiver.recv().await.unwrap();
        assert_eq!(skipped.topic(), "tool.skipped");
    }

    #[tokio::test]
    async fn timed_out_run_keeps_findings_emitted_before_the_deadline() {
        use aoc_adapters::SlowEqAdapter;

        let bus = ContextBus::new(16, 64);
        let mut sub = bus.subscribe(Some("a1".to_string()), None);
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::for_tool("slow-eq"));
        let metrics = MetricsCollector::new();
        let cancel = CancelSignal::new();
        let target = ContractRef::Inline {
            logical_id: "V".to_string(),
            source: String::new(),
        };

        let (outcome, findings) = run_adapter(
            "a1",
            Arc::new(SlowEqAdapter),
            &target,
            &opts(),
            Duration::from_millis(200),
            &breaker,
            &cancel,
            &bus,
            &metrics,
        )
        .await;

        assert_eq!(outcome, RunOutcome::TimedOut);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].vulnerability_type, "reentrancy-eth");
        assert_eq!(findings[1].vulnerability_type, "arbitrary-send");

        let started = sub.receiver.recv().await.unwrap();
        assert_eq!(started.topic(), "tool.started");
        let timed_out = sub.receiver.recv().await.unwrap();
        assert_eq!(timed_out.topic(), "tool.timeout");
    }
}
