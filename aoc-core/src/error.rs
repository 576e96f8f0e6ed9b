//! Shared error taxonomy (spec §7).
//!
//! Every fallible public API in the workspace returns `Result<T, AocError>`.
//! `anyhow::Error` is reserved for process-entry boundaries (CLI/server
//! `main`), never for component APIs.

use thiserror::Error;

/// The non-exhaustive set of error kinds the AOC can surface.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AocError {
    #[error("input invalid: {0}")]
    InputInvalid(String),

    #[error("registry conflict: tool id '{0}' already registered")]
    RegistryConflict(String),

    #[error("tool '{0}' unavailable: {1}")]
    ToolUnavailable(String, String),

    #[error("tool '{0}' failed (transient): {1}")]
    ToolFailedTransient(String, String),

    #[error("tool '{0}' failed (permanent): {1}")]
    ToolFailedPermanent(String, String),

    #[error("tool '{0}' timed out after {1}ms")]
    ToolTimeout(String, u64),

    #[error("bus subscriber lost: {0}")]
    BusSubscriberLost(String),

    #[error("finding malformed: {0}")]
    CorrelationMalformed(String),

    #[error("audit '{0}' cancelled")]
    AuditCancelled(String),

    #[error("audit '{0}' reached global deadline before completion")]
    AuditPartialTimeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AocError {
    /// Whether this error kind is non-fatal to an in-progress audit (adapter
    /// and tool-level failures are always recovered locally per spec §7).
    pub fn is_audit_fatal(&self) -> bool {
        matches!(self, AocError::Internal(_))
    }
}

pub type AocResult<T> = Result<T, AocError>;
