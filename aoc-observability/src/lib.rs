//! Structured logging and in-process metrics, ported from the agency's
//! observability crate and trimmed to what an audit run needs: no
//! dashboards, no SLO alerting, no external exporters.

pub mod logging;
pub mod metrics;

pub use logging::{LogContext, LogFormat, LoggingConfig, StructuredLogger};
pub use metrics::{MetricsCollector, MetricsSnapshot};
