//! The Context Bus (spec §4.5): typed, ordered, multi-subscriber fan-out
//! between the scheduler, adapters, correlation engine, and external
//! subscribers. Grounded in the agency's `mpsc`-based event-sender
//! pattern (`WorkerPoolManager::event_sender`), generalized from a single
//! unbounded channel to per-subscriber bounded channels with slow-
//! subscriber eviction, since the bus here has many concurrent,
//! independently-paced consumers rather than one internal listener.

use aoc_core::{BusEvent, BusPayload};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::warn;

/// A live subscription: an ordered, bounded stream of events matching an
/// optional audit id and optional topic filter.
pub struct Subscription {
    pub receiver: mpsc::Receiver<BusEvent>,
}

struct Subscriber {
    id: u64,
    audit_id: Option<String>,
    topics: Option<HashSet<&'static str>>,
    sender: mpsc::Sender<BusEvent>,
}

struct AuditLog {
    sequence: AtomicU64,
    /// Bounded retention ring buffer backing `replay` (spec §4.5:
    /// "bounded retention, e.g., until audit_completed + retention_window").
    events: RwLock<Vec<BusEvent>>,
}

impl AuditLog {
    fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
            events: RwLock::new(Vec::new()),
        }
    }
}

pub struct ContextBus {
    subscriber_buffer: usize,
    retention_per_audit: usize,
    subscribers: RwLock<Vec<Subscriber>>,
    next_subscriber_id: AtomicU64,
    audit_logs: DashMap<String, Arc<AuditLog>>,
}

impl ContextBus {
    pub fn new(subscriber_buffer: usize, retention_per_audit: usize) -> Self {
        Self {
            subscriber_buffer,
            retention_per_audit,
            subscribers: RwLock::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
            audit_logs: DashMap::new(),
        }
    }

    fn audit_log(&self, audit_id: &str) -> Arc<AuditLog> {
        self.audit_logs
            .entry(audit_id.to_string())
            .or_insert_with(|| Arc::new(AuditLog::new()))
            .clone()
    }

    /// Non-blocking: assigns the next sequence number for
    /// `(audit_id, topic)`, appends to the retention log, and fans out to
    /// every matching subscriber without waiting on any of them.
    pub fn publish(&self, audit_id: &str, payload: BusPayload) {
        let log = self.audit_log(audit_id);
        let sequence = log.sequence.fetch_add(1, Ordering::SeqCst);
        let event = BusEvent {
            audit_id: audit_id.to_string(),
            timestamp: chrono::Utc::now(),
            sequence,
            payload,
        };

        {
            let mut events = log.events.write().unwrap();
            events.push(event.clone());
            if events.len() > self.retention_per_audit {
                let overflow = events.len() - self.retention_per_audit;
                events.drain(0..overflow);
            }
        }

        let mut lost = Vec::new();
        {
            let subscribers = self.subscribers.read().unwrap();
            for sub in subscribers.iter() {
                if !Self::matches(sub, &event) {
                    continue;
                }
                match sub.sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => lost.push(sub.id),
                    Err(mpsc::error::TrySendError::Closed(_)) => lost.push(sub.id),
                }
            }
        }

        if !lost.is_empty() {
            self.evict(&lost, audit_id);
        }
    }

    fn matches(sub: &Subscriber, event: &BusEvent) -> bool {
        if let Some(audit_id) = &sub.audit_id {
            if audit_id != &event.audit_id {
                return false;
            }
        }
        if let Some(topics) = &sub.topics {
            if !topics.contains(event.topic()) {
                return false;
            }
        }
        true
    }

    fn evict(&self, lost_ids: &[u64], audit_id: &str) {
        let mut subscribers = self.subscribers.write().unwrap();
        subscribers.retain(|s| !lost_ids.contains(&s.id));
        drop(subscribers);
        for _ in lost_ids {
            warn!(audit_id, "subscriber buffer full, evicting slow subscriber");
            self.publish(
                audit_id,
                BusPayload::SubscriberLost {
                    subscriber: "evicted".to_string(),
                },
            );
        }
    }

    /// Returns an ordered, bounded-buffer stream of future events matching
    /// `audit_id`/`topics`. Dropping the returned `Subscription` releases
    /// the channel.
    pub fn subscribe(
        &self,
        audit_id: Option<String>,
        topics: Option<Vec<&'static str>>,
    ) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.subscriber_buffer);
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.write().unwrap().push(Subscriber {
            id,
            audit_id,
            topics: topics.map(|t| t.into_iter().collect()),
            sender,
        });
        Subscription { receiver }
    }

    /// Replays the retained event log for `audit_id`, filtered by topic.
    pub fn replay(&self, audit_id: &str, topics: Option<&[&'static str]>) -> Vec<BusEvent> {
        let Some(log) = self.audit_logs.get(audit_id) else {
            return Vec::new();
        };
        let events = log.events.read().unwrap();
        match topics {
            Some(topics) => events
                .iter()
                .filter(|e| topics.contains(&e.topic()))
                .cloned()
                .collect(),
            None => events.clone(),
        }
    }

    /// Drops all retained state for an audit (called once it reaches a
    /// terminal state and the retention window elapses).
    pub fn forget(&self, audit_id: &str) {
        self.audit_logs.remove(audit_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_events_in_publish_order() {
        let bus = ContextBus::new(16, 1024);
        let mut sub = bus.subscribe(Some("audit-1".to_string()), None);

        bus.publish("audit-1", BusPayload::ToolStarted { tool_id: "a".into(), layer: 1 });
        bus.publish("audit-1", BusPayload::ToolStarted { tool_id: "b".into(), layer: 1 });

        let first = sub.receiver.recv().await.unwrap();
        let second = sub.receiver.recv().await.unwrap();
        assert!(first.sequence < second.sequence);
    }

    #[tokio::test]
    async fn subscriber_only_sees_matching_audit_id() {
        let bus = ContextBus::new(16, 1024);
        let mut sub = bus.subscribe(Some("audit-1".to_string()), None);

        bus.publish("audit-2", BusPayload::AuditCancelled);
        bus.publish("audit-1", BusPayload::AuditCancelled);

        let event = sub.receiver.recv().await.unwrap();
        assert_eq!(event.audit_id, "audit-1");
    }

    #[tokio::test]
    async fn topic_filter_excludes_other_topics() {
        let bus = ContextBus::new(16, 1024);
        let mut sub = bus.subscribe(None, Some(vec!["tool.started"]));

        bus.publish("audit-1", BusPayload::AuditCancelled);
        bus.publish("audit-1", BusPayload::ToolStarted { tool_id: "a".into(), layer: 1 });

        let event = sub.receiver.recv().await.unwrap();
        assert_eq!(event.topic(), "tool.started");
    }

    #[test]
    fn replay_returns_retained_events_for_audit() {
        let bus = ContextBus::new(16, 1024);
        bus.publish("audit-1", BusPayload::AuditCancelled);
        let replayed = bus.replay("audit-1", None);
        assert_eq!(replayed.len(), 1);
    }

    #[tokio::test]
    async fn full_buffer_evicts_subscriber_without_blocking_publisher() {
        let bus = ContextBus::new(1, 1024);
        let _sub = bus.subscribe(Some("audit-1".to_string()), None);

        for i in 0..10 {
            bus.publish(
                "audit-1",
                BusPayload::ToolStarted { tool_id: format!("t{i}"), layer: 1 },
            );
        }
        // Publisher must have returned for all ten without deadlocking;
        // reaching this point is the assertion.
    }
}
