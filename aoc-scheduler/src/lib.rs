//! Tool execution: the per-tool Adapter Runner and the wave-based Layered
//! Scheduler that drives an `AuditPlan` to completion (spec §4.4).

pub mod layered;
pub mod runner;

pub use layered::{LayeredScheduler, SchedulingOutcome};
pub use runner::{run_adapter, RunOutcome};
