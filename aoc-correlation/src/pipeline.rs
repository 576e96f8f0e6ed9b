//! The correlation pipeline (spec §4.6): group by fingerprint, adjust
//! confidence against FP priors, apply cross-validation requirements for
//! classes named in `CorrelationConfig.cross_validation_required`, apply a
//! semantic-context pass for guard-mitigated findings, and derive final
//! severity. Grounded in the agency's council consensus aggregation
//! (`council/src/types.rs`'s per-judge confidence rolled into one
//! `ConsensusResult`), generalized from N-judge voting to N-tool witness
//! aggregation over a security finding.

use crate::fingerprint::fingerprint;
use aoc_core::{CorrelatedFinding, CorrelationConfig, Finding, Severity};
use std::collections::HashMap;
use tracing::debug;

/// Guard-keyword heuristic for the semantic-context pass (spec §4.6 step 5
/// "Semantic context": a finding in a function protected by a reentrancy
/// guard is demoted even when multiple tools agree on it).
fn looks_guarded(finding: &Finding) -> bool {
    finding.description.contains("nonReentrant")
        || finding.description.contains("ReentrancyGuard")
        || finding
            .raw_payload
            .to_string()
            .to_ascii_lowercase()
            .contains("guard")
}

/// Runs the full correlation pass over one audit's normalized findings.
/// Deterministic: the same input slice (in any order) always produces the
/// same set of `CorrelatedFinding`s, since grouping is keyed purely by
/// fingerprint and confidence math has no hidden order-dependence (spec §8
/// "Correlation determinism").
pub fn correlate(
    findings: &[Finding],
    fp_priors: &HashMap<String, f64>,
    config: &CorrelationConfig,
) -> Vec<CorrelatedFinding> {
    let mut groups: HashMap<String, Vec<Finding>> = HashMap::new();
    for finding in findings {
        if !finding.has_known_location() {
            debug!(finding_id = %finding.id, "dropping finding with no known location from correlation");
            continue;
        }
        groups
            .entry(fingerprint(finding))
            .or_default()
            .push(finding.clone());
    }

    let mut out: Vec<CorrelatedFinding> = groups
        .into_iter()
        .map(|(fp, witnesses)| build_correlated(fp, witnesses, fp_priors, config))
        .collect();

    // Stable, content-derived ordering: by fingerprint, so output order
    // never depends on input order or HashMap iteration order.
    out.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
    out
}

fn build_correlated(
    fingerprint: String,
    mut witnesses: Vec<Finding>,
    fp_priors: &HashMap<String, f64>,
    config: &CorrelationConfig,
) -> CorrelatedFinding {
    witnesses.sort_by(|a, b| a.source_tool.cmp(&b.source_tool));

    let primary = witnesses
        .iter()
        .max_by(|a, b| a.confidence_raw.partial_cmp(&b.confidence_raw).unwrap())
        .expect("groups are never empty")
        .clone();

    let class = primary.taxonomy.canonical_class(&primary.vulnerability_type);
    let fp_prior = fp_priors.get(&class).copied().unwrap_or(0.3);

    let distinct_tools: std::collections::BTreeSet<&str> =
        witnesses.iter().map(|w| w.source_tool.as_str()).collect();
    let independent_witness_count = distinct_tools.len();

    // Step: FP-prior adjustment. Average raw confidence across witnesses,
    // discounted by the class's prior false-positive rate.
    let mean_confidence =
        witnesses.iter().map(|w| w.confidence_raw).sum::<f64>() / witnesses.len() as f64;
    let mut confidence = mean_confidence * (1.0 - fp_prior);

    // Step: cross-validation cap. Classes named in `cross_validation_required`
    // may never exceed `single_tool_max_confidence` on a single witness.
    let requires_cross_validation = config
        .cross_validation_required
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&class));
    let mut requires_human_review = false;

    if requires_cross_validation && independent_witness_count < 2 {
        confidence = confidence.min(config.single_tool_max_confidence);
        requires_human_review = true;
    }

    // Step: independent-witness boost. Applies to every finding regardless
    // of class: each *additional* independent witness multiplies residual
    // confidence by 1.25, compounding, up to a cap of 0.98.
    if independent_witness_count > 1 {
        let multiplier = 1.25f64.powi(independent_witness_count as i32 - 1);
        confidence = (confidence * multiplier).min(0.98);
    }

    // Step: semantic context. A witness whose own evidence names a guard
    // modifier demotes confidence further, since the raw detector already
    // suspected this but the adapters don't discard guarded matches
    // themselves (the correlator owns the final call).
    if witnesses.iter().any(looks_guarded) {
        confidence *= 0.5;
    }

    confidence = confidence.clamp(0.0, 1.0);

    // Step: final severity. Starts from the highest severity any witness
    // reported; a badly-discounted result demotes one level, and a
    // cross-validated, well-corroborated one promotes one level.
    let mut severity_final = witnesses
        .iter()
        .map(|w| w.severity_normalized)
        .max()
        .unwrap_or(Severity::Medium);

    if confidence < 0.3 {
        severity_final = severity_final.demote();
    }
    if independent_witness_count >= 3 && confidence >= 0.85 {
        severity_final = severity_final.promote();
    }

    // A HIGH/CRITICAL final severity always requires human review, on top
    // of the single-witness cross-validation-cap reason above.
    requires_human_review |= matches!(severity_final, Severity::High | Severity::Critical);

    CorrelatedFinding {
        fingerprint,
        title: primary.title.clone(),
        description: primary.description.clone(),
        vulnerability_type: primary.vulnerability_type.clone(),
        taxonomy: primary.taxonomy.clone(),
        witnesses,
        confidence_adjusted: confidence,
        severity_final,
        requires_human_review,
        revision: independent_witness_count as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_core::{Location, Taxonomy};
    use proptest::prelude::*;

    fn finding(tool: &str, class: &str, confidence: f64, severity: Severity) -> Finding {
        Finding {
            id: format!("{tool}-{class}"),
            source_tool: tool.to_string(),
            layer: 1,
            vulnerability_type: class.to_string(),
            severity_native: severity.to_string(),
            severity_normalized: severity,
            confidence_raw: confidence,
            location: Location {
                file: "Vault.sol".to_string(),
                line_start: 42,
                line_end: None,
                function: Some("withdraw".to_string()),
                contract: Some("Vault".to_string()),
            },
            title: class.to_string(),
            description: String::new(),
            remediation_hint: None,
            taxonomy: Taxonomy::default(),
            raw_payload: serde_json::json!({}),
        }
    }

    #[test]
    fn single_tool_cross_validation_class_is_capped_and_flagged() {
        let config = CorrelationConfig::default();
        let priors = HashMap::from([("reentrancy-eth".to_string(), 0.18)]);
        let findings = vec![finding("slither-eq", "reentrancy-eth", 0.9, Severity::High)];

        let correlated = correlate(&findings, &priors, &config);
        assert_eq!(correlated.len(), 1);
        assert!(correlated[0].confidence_adjusted <= config.single_tool_max_confidence);
        assert!(correlated[0].requires_human_review);
    }

    #[test]
    fn two_independent_tools_boost_confidence_over_single_tool() {
        let config = CorrelationConfig::default();
        let priors = HashMap::from([("reentrancy-eth".to_string(), 0.18)]);

        let one = vec![finding("slither-eq", "reentrancy-eth", 0.8, Severity::High)];
        let two = vec![
            finding("slither-eq", "reentrancy-eth", 0.8, Severity::High),
            finding("mythril-eq", "reentrancy-eth", 0.8, Severity::High),
        ];

        let one_result = correlate(&one, &priors, &config);
        let two_result = correlate(&two, &priors, &config);

        assert!(two_result[0].confidence_adjusted > one_result[0].confidence_adjusted);
        assert_eq!(two_result[0].witness_count(), 2);
    }

    #[test]
    fn three_tool_consensus_promotes_to_critical() {
        let config = CorrelationConfig::default();
        let priors = HashMap::from([("reentrancy-eth".to_string(), 0.1)]);
        let findings = vec![
            finding("slither-eq", "reentrancy-eth", 0.8, Severity::High),
            finding("mythril-eq", "reentrancy-eth", 0.8, Severity::High),
            finding("aderyn-eq", "reentrancy-eth", 0.8, Severity::High),
        ];

        let correlated = correlate(&findings, &priors, &config);
        assert_eq!(correlated.len(), 1);
        assert_eq!(correlated[0].witness_count(), 3);
        assert!(correlated[0].confidence_adjusted >= 0.85);
        assert_eq!(correlated[0].severity_final, Severity::Critical);
        assert!(correlated[0].requires_human_review);
    }

    #[test]
    fn any_high_severity_finding_requires_human_review_even_without_cross_validation() {
        let config = CorrelationConfig::default();
        let priors = HashMap::new();
        let findings = vec![finding("slither-eq", "unchecked-return", 0.9, Severity::High)];

        let correlated = correlate(&findings, &priors, &config);
        assert_eq!(correlated[0].severity_final, Severity::High);
        assert!(correlated[0].requires_human_review);
    }

    #[test]
    fn guarded_finding_demotes_confidence() {
        let config = CorrelationConfig::default();
        let priors = HashMap::new();
        let mut f = finding("slither-eq", "reentrancy-no-eth", 0.8, Severity::Medium);
        f.description = "protected by nonReentrant modifier".to_string();

        let correlated = correlate(&[f], &priors, &config);
        assert!(correlated[0].confidence_adjusted < 0.4);
    }

    #[test]
    fn findings_without_location_are_dropped_from_correlation() {
        let config = CorrelationConfig::default();
        let priors = HashMap::new();
        let mut f = finding("slither-eq", "reentrancy-eth", 0.8, Severity::High);
        f.location.file = String::new();

        let correlated = correlate(&[f], &priors, &config);
        assert!(correlated.is_empty());
    }

    proptest! {
        #[test]
        fn correlation_is_order_independent(seed in 0u64..1000) {
            let config = CorrelationConfig::default();
            let priors = HashMap::from([("reentrancy-eth".to_string(), 0.18)]);
            let mut findings = vec![
                finding("slither-eq", "reentrancy-eth", 0.7, Severity::High),
                finding("mythril-eq", "reentrancy-eth", 0.6, Severity::Medium),
                finding("aderyn-eq", "reentrancy-eth", 0.65, Severity::High),
            ];
            let forward = correlate(&findings, &priors, &config);

            // deterministic pseudo-shuffle keyed by `seed`, no RNG needed
            if seed % 2 == 0 {
                findings.reverse();
            } else {
                findings.swap(0, 2);
            }
            let shuffled = correlate(&findings, &priors, &config);

            prop_assert_eq!(forward.len(), shuffled.len());
            prop_assert_eq!(forward[0].fingerprint.clone(), shuffled[0].fingerprint.clone());
            prop_assert!((forward[0].confidence_adjusted - shuffled[0].confidence_adjusted).abs() < 1e-9);
        }

        #[test]
        fn correlation_is_idempotent_on_repeated_runs(conf in 0.0f64..1.0, sev_pick in 0u8..5) {
            let config = CorrelationConfig::default();
            let priors = HashMap::new();
            let severity = match sev_pick {
                0 => Severity::Info,
                1 => Severity::Low,
                2 => Severity::Medium,
                3 => Severity::High,
                _ => Severity::Critical,
            };
            let findings = vec![finding("slither-eq", "arbitrary-send", conf, severity)];

            let first = correlate(&findings, &priors, &config);
            let second = correlate(&findings, &priors, &config);

            prop_assert_eq!(first[0].confidence_adjusted, second[0].confidence_adjusted);
            prop_assert_eq!(first[0].severity_final, second[0].severity_final);
        }
    }
}
