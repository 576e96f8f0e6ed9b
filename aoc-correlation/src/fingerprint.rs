//! Finding fingerprinting (spec §4.6 step 1): reduces a `Finding` to a
//! stable key so that independent tools reporting the same underlying
//! vulnerability land in the same correlation group. Grounded in the
//! agency's content-addressed verdict ids (`VerdictId` derived from task
//! content in `council/src/types.rs`), generalized from a random `Uuid` to a
//! deterministic hash so the same finding always fingerprints the same way
//! across runs, tools, and processes.

use aoc_core::Finding;
use sha2::{Digest, Sha256};

/// A location bucket coarse enough to absorb +/-N line drift between tools
/// that report slightly different anchor lines for the same construct.
const LINE_BUCKET: u32 = 3;

/// Deterministic fingerprint: `canonical_class` (taxonomy-first, falling
/// back to the tool's native class name) plus contract, function, file, and
/// a bucketed line number. Two findings from different tools fingerprint
/// identically iff they name the same vulnerability class in the same
/// contract/function in the same few-line window of the same file (spec
/// §4.6 step 1 "Grouping key").
pub fn fingerprint(finding: &Finding) -> String {
    let class = finding.taxonomy.canonical_class(&finding.vulnerability_type);
    let bucket = finding.location.line_start / LINE_BUCKET;

    let mut hasher = Sha256::new();
    hasher.update(class.as_bytes());
    hasher.update(b"|");
    hasher.update(finding.location.contract.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(finding.location.function.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(finding.location.file.as_bytes());
    hasher.update(b"|");
    hasher.update(bucket.to_le_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_core::{Location, Taxonomy};

    fn finding_at(tool: &str, line: u32, class: &str) -> Finding {
        finding_in("Vault", "withdraw", tool, line, class)
    }

    fn finding_in(contract: &str, function: &str, tool: &str, line: u32, class: &str) -> Finding {
        Finding {
            id: format!("{tool}-{line}"),
            source_tool: tool.to_string(),
            layer: 1,
            vulnerability_type: class.to_string(),
            severity_native: "high".to_string(),
            severity_normalized: aoc_core::Severity::High,
            confidence_raw: 0.8,
            location: Location {
                file: "Vault.sol".to_string(),
                line_start: line,
                line_end: None,
                function: Some(function.to_string()),
                contract: Some(contract.to_string()),
            },
            title: class.to_string(),
            description: String::new(),
            remediation_hint: None,
            taxonomy: Taxonomy::default(),
            raw_payload: serde_json::json!({}),
        }
    }

    #[test]
    fn same_class_and_nearby_line_fingerprints_identically_across_tools() {
        let a = finding_at("slither-eq", 42, "reentrancy-eth");
        let b = finding_at("mythril-eq", 43, "reentrancy-eth");
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn different_class_fingerprints_differently() {
        let a = finding_at("slither-eq", 42, "reentrancy-eth");
        let b = finding_at("slither-eq", 42, "arbitrary-send");
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn distant_line_fingerprints_differently() {
        let a = finding_at("slither-eq", 10, "reentrancy-eth");
        let b = finding_at("slither-eq", 400, "reentrancy-eth");
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = finding_at("slither-eq", 42, "reentrancy-eth");
        assert_eq!(fingerprint(&a), fingerprint(&a));
    }

    #[test]
    fn different_function_in_same_file_and_class_fingerprints_differently() {
        let a = finding_in("Vault", "withdraw", "slither-eq", 42, "reentrancy-eth");
        let b = finding_in("Vault", "deposit", "slither-eq", 42, "reentrancy-eth");
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn different_contract_in_same_file_and_class_fingerprints_differently() {
        let a = finding_in("Vault", "withdraw", "slither-eq", 42, "reentrancy-eth");
        let b = finding_in("Escrow", "withdraw", "slither-eq", 42, "reentrancy-eth");
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
