//! The structured report returned by `get_report`/`get_audit` (spec §6.1,
//! §6.6 `summary.json`). Compliance mapping lives here, not on
//! `CorrelatedFinding` itself: it is presentation-layer data joined in at
//! report time, never consulted by the correlation engine (spec §4.7
//! "this join is a pure lookup; it does not alter severity or confidence").

use aoc_core::{CorrelatedFinding, ReportStatus, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFinding {
    #[serde(flatten)]
    pub finding: CorrelatedFinding,
    pub compliance_hits: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub audit_id: String,
    pub status: ReportStatus,
    pub partial_timeout: bool,
    pub duration_s: f64,
    pub tools_used: Vec<String>,
    pub findings: Vec<ReportFinding>,
    pub counts_by_severity: HashMap<Severity, u32>,
}

/// Joins each finding's taxonomy identifiers against the static compliance
/// table and builds the report's severity histogram (spec §4.7).
pub fn build_report(
    audit_id: String,
    status: ReportStatus,
    partial_timeout: bool,
    duration_s: f64,
    tools_used: Vec<String>,
    correlated: Vec<CorrelatedFinding>,
    compliance_map: &HashMap<String, Vec<String>>,
) -> AuditReport {
    let mut counts_by_severity: HashMap<Severity, u32> = HashMap::new();
    let findings = correlated
        .into_iter()
        .map(|finding| {
            *counts_by_severity.entry(finding.severity_final).or_insert(0) += 1;
            let mut compliance_hits = Vec::new();
            for id in [&finding.taxonomy.swc, &finding.taxonomy.cwe, &finding.taxonomy.owasp_sc]
                .into_iter()
                .flatten()
            {
                if let Some(hits) = compliance_map.get(id) {
                    compliance_hits.extend(hits.iter().cloned());
                }
            }
            compliance_hits.sort();
            compliance_hits.dedup();
            ReportFinding {
                finding,
                compliance_hits,
            }
        })
        .collect();

    AuditReport {
        audit_id,
        status,
        partial_timeout,
        duration_s,
        tools_used,
        findings,
        counts_by_severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_core::{Finding, Location, Taxonomy};

    fn sample_correlated() -> CorrelatedFinding {
        CorrelatedFinding {
            fingerprint: "fp1".to_string(),
            title: "Reentrancy".to_string(),
            description: "desc".to_string(),
            vulnerability_type: "reentrancy-eth".to_string(),
            taxonomy: Taxonomy {
                swc: Some("SWC-107".to_string()),
                cwe: None,
                owasp_sc: None,
            },
            witnesses: vec![Finding {
                id: "f1".to_string(),
                source_tool: "slither-eq".to_string(),
                layer: 1,
                vulnerability_type: "reentrancy-eth".to_string(),
                severity_native: "high".to_string(),
                severity_normalized: Severity::High,
                confidence_raw: 0.8,
                location: Location {
                    file: "V.sol".to_string(),
                    line_start: 1,
                    line_end: None,
                    function: None,
                    contract: None,
                },
                title: "Reentrancy".to_string(),
                description: "desc".to_string(),
                remediation_hint: None,
                taxonomy: Taxonomy::default(),
                raw_payload: serde_json::json!({}),
            }],
            confidence_adjusted: 0.7,
            severity_final: Severity::High,
            requires_human_review: true,
            revision: 1,
        }
    }

    #[test]
    fn compliance_hits_are_joined_and_deduplicated() {
        let compliance_map = HashMap::from([(
            "SWC-107".to_string(),
            vec!["ISO27001-A.14.2.5".to_string(), "NIST-SSDF-PW.4.1".to_string()],
        )]);
        let report = build_report(
            "a1".to_string(),
            ReportStatus::Ok,
            false,
            12.5,
            vec!["slither-eq".to_string()],
            vec![sample_correlated()],
            &compliance_map,
        );

        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].compliance_hits.len(), 2);
        assert_eq!(report.counts_by_severity[&Severity::High], 1);
    }
}
