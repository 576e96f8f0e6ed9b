//! The canonical Finding record (spec §3) and the raw-to-normalized
//! transformation (spec §4.1).

use crate::error::{AocError, AocResult};
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source location of a finding within a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line_start: u32,
    pub line_end: Option<u32>,
    pub function: Option<String>,
    pub contract: Option<String>,
}

/// The triple taxonomy a normalized finding may carry (SWC / CWE / OWASP SC).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub swc: Option<String>,
    pub cwe: Option<String>,
    pub owasp_sc: Option<String>,
}

impl Taxonomy {
    pub fn is_empty(&self) -> bool {
        self.swc.is_none() && self.cwe.is_none() && self.owasp_sc.is_none()
    }

    /// The most specific identifier available, used as the fingerprint's
    /// normalized-class component (spec §4.6 step 1).
    pub fn canonical_class(&self, fallback_native_class: &str) -> String {
        self.swc
            .clone()
            .or_else(|| self.cwe.clone())
            .or_else(|| self.owasp_sc.clone())
            .unwrap_or_else(|| fallback_native_class.to_ascii_lowercase())
    }
}

/// Raw finding as produced by an adapter's `normalize()`, before the
/// severity/confidence/taxonomy pass is applied. This is the adapter's
/// native view; `Finding` is the canonical post-normalization record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFinding {
    pub source_tool: String,
    pub vulnerability_type: String,
    pub severity_native: Option<String>,
    pub confidence_raw: Option<f64>,
    pub location: Option<Location>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub remediation_hint: Option<String>,
    pub raw_payload: serde_json::Value,
}

/// Canonical, post-adapter finding (spec §3 "Finding").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub source_tool: String,
    pub layer: u8,
    pub vulnerability_type: String,
    pub severity_native: String,
    pub severity_normalized: Severity,
    pub confidence_raw: f64,
    pub location: Location,
    pub title: String,
    pub description: String,
    pub remediation_hint: Option<String>,
    pub taxonomy: Taxonomy,
    pub raw_payload: serde_json::Value,
}

impl Finding {
    /// Findings outside any known source location are never correlated
    /// (spec §4.6 "edges"): tool-level errors and project-global warnings.
    pub fn has_known_location(&self) -> bool {
        !self.location.file.is_empty()
    }
}

/// Native severity label → normalized severity (spec §3 `severity_map.json`).
/// Unknown labels fall back to `Medium` — a conservative choice, never
/// silently downgraded to `Info` (spec §4.1).
pub fn normalize_severity(native: &str) -> Severity {
    match native.to_ascii_lowercase().as_str() {
        "info" | "informational" | "note" | "optimization" => Severity::Info,
        "low" | "minor" => Severity::Low,
        "medium" | "moderate" | "warning" => Severity::Medium,
        "high" | "major" => Severity::High,
        "critical" | "severe" | "blocker" => Severity::Critical,
        _ => Severity::Medium,
    }
}

/// As `normalize_severity`, but first consults a per-tool override loaded
/// from `severity_map.json` for tools whose native vocabulary doesn't match
/// the common spellings handled by the generic table.
pub fn normalize_severity_for_tool(
    tool: &str,
    native: &str,
    severity_map: Option<&HashMap<String, HashMap<String, String>>>,
) -> Severity {
    if let Some(overridden) = severity_map
        .and_then(|map| map.get(tool))
        .and_then(|labels| labels.get(&native.to_ascii_lowercase()))
    {
        return normalize_severity(overridden);
    }
    normalize_severity(native)
}

/// `normalize(finding_raw) -> Finding` (spec §4.1 contract).
///
/// Returns `AocError::CorrelationMalformed` only when the minimum fields
/// (source tool, vulnerability class, file+line location) are missing.
pub fn normalize(
    raw: RawFinding,
    layer: u8,
    taxonomy_map: &HashMap<String, Taxonomy>,
    severity_map: Option<&HashMap<String, HashMap<String, String>>>,
    id: impl Into<String>,
) -> AocResult<Finding> {
    if raw.source_tool.trim().is_empty() {
        return Err(AocError::CorrelationMalformed(
            "missing source_tool".to_string(),
        ));
    }
    if raw.vulnerability_type.trim().is_empty() {
        return Err(AocError::CorrelationMalformed(
            "missing vulnerability_type".to_string(),
        ));
    }
    let location = raw.location.ok_or_else(|| {
        AocError::CorrelationMalformed("missing location (file+line)".to_string())
    })?;
    if location.file.trim().is_empty() {
        return Err(AocError::CorrelationMalformed(
            "location missing file".to_string(),
        ));
    }

    let severity_native = raw
        .severity_native
        .clone()
        .unwrap_or_else(|| "medium".to_string());
    let severity_normalized =
        normalize_severity_for_tool(&raw.source_tool, &severity_native, severity_map);
    let confidence_raw = raw.confidence_raw.unwrap_or(0.5).clamp(0.0, 1.0);
    let taxonomy = taxonomy_map
        .get(&raw.vulnerability_type.to_ascii_lowercase())
        .cloned()
        .unwrap_or_default();

    Ok(Finding {
        id: id.into(),
        source_tool: raw.source_tool,
        layer,
        title: raw
            .title
            .unwrap_or_else(|| raw.vulnerability_type.clone()),
        vulnerability_type: raw.vulnerability_type,
        severity_native,
        severity_normalized,
        confidence_raw,
        location,
        description: raw.description.unwrap_or_default(),
        remediation_hint: raw.remediation_hint,
        taxonomy,
        raw_payload: raw.raw_payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawFinding {
        RawFinding {
            source_tool: "slither-eq".to_string(),
            vulnerability_type: "reentrancy-eth".to_string(),
            severity_native: Some("High".to_string()),
            confidence_raw: Some(0.8),
            location: Some(Location {
                file: "Vault.sol".to_string(),
                line_start: 42,
                line_end: None,
                function: Some("withdraw".to_string()),
                contract: Some("Vault".to_string()),
            }),
            title: None,
            description: Some("external call before balance update".to_string()),
            remediation_hint: None,
            raw_payload: serde_json::json!({}),
        }
    }

    #[test]
    fn normalize_fills_required_fields() {
        let taxonomy_map = HashMap::new();
        let finding = normalize(sample_raw(), 1, &taxonomy_map, None, "f1").unwrap();
        assert_eq!(finding.severity_normalized, Severity::High);
        assert!((finding.confidence_raw - 0.8).abs() < f64::EPSILON);
        assert!(finding.taxonomy.is_empty());
    }

    #[test]
    fn normalize_rejects_missing_location() {
        let mut raw = sample_raw();
        raw.location = None;
        let taxonomy_map = HashMap::new();
        let err = normalize(raw, 1, &taxonomy_map, None, "f1").unwrap_err();
        assert!(matches!(err, AocError::CorrelationMalformed(_)));
    }

    #[test]
    fn unknown_severity_falls_back_to_medium() {
        assert_eq!(normalize_severity("bogus"), Severity::Medium);
    }

    #[test]
    fn confidence_is_clipped_into_unit_interval() {
        let mut raw = sample_raw();
        raw.confidence_raw = Some(1.7);
        let taxonomy_map = HashMap::new();
        let finding = normalize(raw, 1, &taxonomy_map, None, "f1").unwrap();
        assert_eq!(finding.confidence_raw, 1.0);
    }
}
