//! Typed BusEvent envelope (spec §3 "BusEvent", §6.3 "Event stream").
//!
//! Re-architected as a tagged union rather than a duck-typed payload (spec
//! §9 "Implicit source-language reflection"): subscribers match on the
//! `BusEvent` variant, not on a free-form topic string, though each variant
//! still carries its spec-named `topic()` for external presentation.

use crate::correlated::CorrelatedFinding;
use crate::finding::Finding;
use crate::plan::AuditPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload")]
pub enum BusPayload {
    #[serde(rename = "plan.created")]
    PlanCreated { plan: AuditPlan },
    #[serde(rename = "tool.started")]
    ToolStarted { tool_id: String, layer: u8 },
    #[serde(rename = "tool.finished")]
    ToolFinished {
        tool_id: String,
        layer: u8,
        finding_count: usize,
    },
    #[serde(rename = "tool.skipped")]
    ToolSkipped { tool_id: String, reason: String },
    #[serde(rename = "tool.failed")]
    ToolFailed {
        tool_id: String,
        transient: bool,
        error: String,
    },
    #[serde(rename = "tool.timeout")]
    ToolTimeout { tool_id: String, after_ms: u64 },
    #[serde(rename = "finding.raw")]
    FindingRaw { tool_id: String },
    #[serde(rename = "finding.normalized")]
    FindingNormalized { finding: Finding },
    #[serde(rename = "finding.correlated")]
    FindingCorrelated { finding: CorrelatedFinding },
    #[serde(rename = "audit.progress")]
    AuditProgress {
        tools_pending: u32,
        tools_running: u32,
        tools_finished: u32,
    },
    #[serde(rename = "audit.partial_timeout")]
    AuditPartialTimeout,
    #[serde(rename = "audit.completed")]
    AuditCompleted { partial_timeout: bool },
    #[serde(rename = "audit.cancelled")]
    AuditCancelled,
    #[serde(rename = "audit.failed")]
    AuditFailed { error: String },
    #[serde(rename = "bus.subscriber_lost")]
    SubscriberLost { subscriber: String },
    #[serde(rename = "governance.warning")]
    GovernanceWarning { message: String },
}

impl BusPayload {
    /// The topic string as named in spec §3/§6.3, for external presentation
    /// (REST/event-stream envelopes) and for per-topic ordering keys.
    pub fn topic(&self) -> &'static str {
        match self {
            BusPayload::PlanCreated { .. } => "plan.created",
            BusPayload::ToolStarted { .. } => "tool.started",
            BusPayload::ToolFinished { .. } => "tool.finished",
            BusPayload::ToolSkipped { .. } => "tool.skipped",
            BusPayload::ToolFailed { .. } => "tool.failed",
            BusPayload::ToolTimeout { .. } => "tool.timeout",
            BusPayload::FindingRaw { .. } => "finding.raw",
            BusPayload::FindingNormalized { .. } => "finding.normalized",
            BusPayload::FindingCorrelated { .. } => "finding.correlated",
            BusPayload::AuditProgress { .. } => "audit.progress",
            BusPayload::AuditPartialTimeout => "audit.partial_timeout",
            BusPayload::AuditCompleted { .. } => "audit.completed",
            BusPayload::AuditCancelled => "audit.cancelled",
            BusPayload::AuditFailed { .. } => "audit.failed",
            BusPayload::SubscriberLost { .. } => "bus.subscriber_lost",
            BusPayload::GovernanceWarning { .. } => "governance.warning",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub audit_id: String,
    pub timestamp: DateTime<Utc>,
    /// Monotonically increasing per (audit_id, topic) sequence number,
    /// backing the "prefix of publish order" property in spec §8.
    pub sequence: u64,
    #[serde(flatten)]
    pub payload: BusPayload,
}

impl BusEvent {
    pub fn topic(&self) -> &'static str {
        self.payload.topic()
    }
}
