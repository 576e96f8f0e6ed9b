//! The Tool Adapter Protocol trait and the built-in mock adapters used by
//! the end-to-end correlation test scenarios.

pub mod mocks;
pub mod protocol;

pub use mocks::{AderynEqAdapter, MythrilEqAdapter, SlitherEqAdapter, SlowEqAdapter};
pub use protocol::{AnalyzeOptions, FindingSink, RawOutput, ToolAdapter};
