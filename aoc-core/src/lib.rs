//! Shared data model for the Analysis Orchestration Core: findings, the
//! severity lattice, tool metadata, audit plans and lifecycle, correlated
//! findings, bus events, static lookup tables, and layered configuration.
//!
//! Every other `aoc-*` crate depends on this one; this crate depends on
//! nothing else in the workspace.

pub mod cancel;
pub mod config;
pub mod correlated;
pub mod error;
pub mod event;
pub mod finding;
pub mod plan;
pub mod severity;
pub mod tables;
pub mod tool;

pub use cancel::CancelSignal;
pub use config::{AocConfig, CorrelationConfig};
pub use correlated::CorrelatedFinding;
pub use error::{AocError, AocResult};
pub use event::{BusEvent, BusPayload};
pub use finding::{
    normalize, normalize_severity, normalize_severity_for_tool, Finding, Location, RawFinding,
    Taxonomy,
};
pub use plan::{
    profile_defaults, validate_custom, AuditPlan, AuditState, ContractRef, CrossLayerMode,
    Profile, ProfileDefaults, ReportStatus,
};
pub use severity::Severity;
pub use tables::{load_compliance_map, load_fp_priors, load_severity_map, load_taxonomy_map};
pub use tool::{Tool, ToolAvailability, ToolCategory};
