//! Scoped structured logging, keyed by `audit_id` rather than a
//! request/user/session triple — AOC has no end-user sessions, only audit
//! runs, so the log context is narrowed to what the domain actually has
//! (spec §9: the original's implicit global-logger coupling is replaced
//! with an explicit per-audit context passed by the caller).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Carries the audit id and component name through a call chain so every
/// log line emitted while processing one audit can be correlated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogContext {
    pub audit_id: String,
    pub component: String,
    pub tags: HashMap<String, String>,
}

impl LogContext {
    pub fn new(audit_id: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            audit_id: audit_id.into(),
            component: component.into(),
            tags: HashMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

pub struct StructuredLogger {
    config: LoggingConfig,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Installs the global `tracing` subscriber. Call once from a process
    /// entry point (aoc-cli or aoc-server's `main`).
    pub fn init(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = EnvFilter::try_from_env("AOC_LOG_LEVEL")
            .unwrap_or_else(|_| EnvFilter::new(&self.config.level));

        let subscriber = tracing_subscriber::registry().with(filter);

        match self.config.format {
            LogFormat::Json => {
                subscriber
                    .with(fmt::layer().json().with_current_span(false))
                    .init();
            }
            LogFormat::Pretty => {
                subscriber.with(fmt::layer().pretty()).init();
            }
            LogFormat::Compact => {
                subscriber.with(fmt::layer().compact()).init();
            }
        }

        info!(
            component = "observability",
            level = %self.config.level,
            format = ?self.config.format,
            "structured logging initialized"
        );
        Ok(())
    }

    pub fn log_info(ctx: &LogContext, message: &str) {
        info!(audit_id = %ctx.audit_id, component = %ctx.component, tags = ?ctx.tags, "{message}");
    }

    pub fn log_warn(ctx: &LogContext, message: &str) {
        warn!(audit_id = %ctx.audit_id, component = %ctx.component, tags = ?ctx.tags, "{message}");
    }

    pub fn log_error(ctx: &LogContext, message: &str, error: Option<&dyn std::error::Error>) {
        error!(
            audit_id = %ctx.audit_id,
            component = %ctx.component,
            tags = ?ctx.tags,
            error = ?error.map(|e| e.to_string()),
            "{message}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_carries_audit_id_and_component() {
        let ctx = LogContext::new("audit-1", "scheduler").with_tag("layer", "3");
        assert_eq!(ctx.audit_id, "audit-1");
        assert_eq!(ctx.tags.get("layer").map(String::as_str), Some("3"));
    }
}
