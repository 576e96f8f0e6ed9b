//! The post-correlation record (spec §3 "CorrelatedFinding").

use crate::finding::{Finding, Taxonomy};
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedFinding {
    pub fingerprint: String,
    pub title: String,
    pub description: String,
    pub vulnerability_type: String,
    pub taxonomy: Taxonomy,
    /// One source Finding per distinct witnessing tool.
    pub witnesses: Vec<Finding>,
    pub confidence_adjusted: f64,
    pub severity_final: Severity,
    pub requires_human_review: bool,
    /// Bumped each time a later witness arrives and the record is re-emitted
    /// (spec §4.6 step 7).
    pub revision: u32,
}

impl CorrelatedFinding {
    /// Distinct tool ids among the witnesses (spec §4.6 step 4:
    /// "Independence ... different tools").
    pub fn distinct_tools(&self) -> std::collections::BTreeSet<&str> {
        self.witnesses
            .iter()
            .map(|w| w.source_tool.as_str())
            .collect()
    }

    pub fn witness_count(&self) -> usize {
        self.distinct_tools().len()
    }
}
