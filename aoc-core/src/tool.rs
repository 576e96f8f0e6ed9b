//! Tool metadata and availability (spec §3 "Tool", "ToolAvailability").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCategory {
    Static,
    Dynamic,
    Symbolic,
    Formal,
    Property,
    Ai,
    Ml,
    DomainSpecific,
    Ensemble,
}

/// Immutable metadata describing one adapter, as returned by
/// `metadata()` (spec §4.2). Stable across calls within a process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub layer: u8,
    pub category: ToolCategory,
    /// Invariant: always `true` — no built-in tool is a hard dependency
    /// (spec §3, §4.3).
    pub optional: bool,
    pub version: String,
    pub license: String,
    pub author: String,
    /// Declares whether concurrent `analyze()` calls on the same adapter
    /// instance are supported. Defaults to `true` (reentrant) per §4.2.
    pub reentrant: bool,
    /// Declares whether a `TOOL_FAILED_TRANSIENT` error may be retried once
    /// by the scheduler (spec §4.4 failure semantics).
    pub idempotent_retryable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolAvailability {
    Available,
    NotInstalled,
    Misconfigured,
    ExternalDown,
    RequiresCredential,
}

impl ToolAvailability {
    pub fn is_available(self) -> bool {
        matches!(self, ToolAvailability::Available)
    }
}
