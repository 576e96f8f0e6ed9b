//! Live `tools_pending/running/finished` counters backing `get_status`
//! (spec §4.7). A background task drains this audit's bus events and keeps
//! the counters current without the coordinator having to poll the
//! scheduler directly — the coordinator's only source of truth for an
//! in-flight audit is the bus, same as any other subscriber.

use aoc_core::BusPayload;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ProgressCounters {
    pub pending: AtomicU32,
    pub running: AtomicU32,
    pub finished: AtomicU32,
    pub raw_findings: AtomicU32,
}

impl ProgressCounters {
    pub fn snapshot(&self) -> (u32, u32, u32, u32) {
        (
            self.pending.load(Ordering::Relaxed),
            self.running.load(Ordering::Relaxed),
            self.finished.load(Ordering::Relaxed),
            self.raw_findings.load(Ordering::Relaxed),
        )
    }

    pub fn set_pending(&self, count: u32) {
        self.pending.store(count, Ordering::Relaxed);
    }

    fn apply(&self, payload: &BusPayload) {
        match payload {
            BusPayload::ToolStarted { .. } => {
                self.running.fetch_add(1, Ordering::Relaxed);
                self.pending.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |p| {
                    Some(p.saturating_sub(1))
                }).ok();
            }
            BusPayload::ToolFinished { finding_count, .. } => {
                self.running.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |r| {
                    Some(r.saturating_sub(1))
                }).ok();
                self.finished.fetch_add(1, Ordering::Relaxed);
                self.raw_findings.fetch_add(*finding_count as u32, Ordering::Relaxed);
            }
            BusPayload::ToolSkipped { .. }
            | BusPayload::ToolFailed { .. }
            | BusPayload::ToolTimeout { .. } => {
                self.running.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |r| {
                    Some(r.saturating_sub(1))
                }).ok();
                self.finished.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}

/// Spawns a task that keeps `counters` current for `audit_id` until a
/// terminal audit event arrives, then exits.
pub fn spawn_tracker(
    bus: Arc<aoc_bus::ContextBus>,
    audit_id: String,
    counters: Arc<ProgressCounters>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut sub = bus.subscribe(Some(audit_id), None);
        while let Some(event) = sub.receiver.recv().await {
            let terminal = matches!(
                event.payload,
                BusPayload::AuditCompleted { .. }
                    | BusPayload::AuditCancelled
                    | BusPayload::AuditFailed { .. }
            );
            counters.apply(&event.payload);
            if terminal {
                break;
            }
        }
    })
}
