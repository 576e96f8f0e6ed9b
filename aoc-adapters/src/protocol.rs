//! The Tool Adapter Protocol (spec §4.2): `metadata`, `availability`,
//! `analyze`, `normalize`. Shaped after the agency's
//! `LanguageAnalyzer` trait — a small, object-safe, `Send + Sync` trait
//! implemented per tool and stored behind `Arc<dyn ToolAdapter>` in the
//! registry.

use aoc_core::{AocResult, CancelSignal, ContractRef, RawFinding, Tool, ToolAvailability};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

/// Adapter-facing options for one `analyze` call.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Directory the adapter may read/write within; it must not touch
    /// anything outside it (spec §4.2 invariant).
    pub workspace_dir: PathBuf,
    pub extra_args: HashMap<String, String>,
}

/// The raw, adapter-native output of one `analyze` call, handed to
/// `normalize` unchanged.
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub payload: serde_json::Value,
}

/// Lets a long-running `analyze` push already-normalized findings as it
/// discovers them, so the runner has something to keep if the call is cut
/// off by its deadline before returning a final `RawOutput` (spec §4.4
/// "partial normalized findings, if any were emitted incrementally, are
/// kept"). Dropping the sink (or never calling `emit`) is always safe — an
/// adapter that can only report findings in one final batch just never
/// uses it.
#[derive(Clone)]
pub struct FindingSink(UnboundedSender<RawFinding>);

impl FindingSink {
    pub fn new(tx: UnboundedSender<RawFinding>) -> Self {
        Self(tx)
    }

    /// Best-effort: the receiving end may already be gone (runner timed
    /// out and dropped it), in which case this is a no-op.
    pub fn emit(&self, finding: RawFinding) {
        let _ = self.0.send(finding);
    }
}

#[async_trait]
pub trait ToolAdapter: Send + Sync + std::fmt::Debug {
    /// Pure; must be stable across calls within a process lifetime.
    fn metadata(&self) -> Tool;

    /// May probe a subprocess or network dependency; must return within a
    /// short bounded time and must never panic or block indefinitely.
    async fn availability(&self) -> ToolAvailability;

    /// May run for seconds to minutes. Must observe `cancel` cooperatively
    /// and must not write outside `options.workspace_dir`. Adapters capable
    /// of incremental discovery should push findings to `emit` as they go,
    /// rather than only returning them in the final `RawOutput`.
    async fn analyze(
        &self,
        target: &ContractRef,
        options: &AnalyzeOptions,
        cancel: &CancelSignal,
        emit: &FindingSink,
    ) -> AocResult<RawOutput>;

    /// Pure, deterministic transformation of one raw output into zero or
    /// more raw findings. Must tolerate partial/malformed output rather
    /// than panicking.
    fn normalize(&self, raw: RawOutput) -> Vec<RawFinding>;
}
