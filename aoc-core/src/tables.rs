//! Loaders for the static lookup tables of spec §6.7: `taxonomy_map.json`,
//! `fp_priors.json`, and `compliance_map.json`. These are data, not code —
//! the loaders only validate shape and clamp numeric ranges.

use crate::error::{AocError, AocResult};
use crate::finding::Taxonomy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TaxonomyEntry {
    swc: Option<String>,
    cwe: Option<String>,
    owasp_sc: Option<String>,
}

/// Loads `taxonomy_map.json`: native vulnerability class → taxonomy triple.
pub fn load_taxonomy_map(path: &Path) -> AocResult<HashMap<String, Taxonomy>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AocError::InputInvalid(format!("reading {}: {e}", path.display())))?;
    let entries: HashMap<String, TaxonomyEntry> = serde_json::from_str(&raw)
        .map_err(|e| AocError::InputInvalid(format!("parsing {}: {e}", path.display())))?;
    Ok(entries
        .into_iter()
        .map(|(class, entry)| {
            (
                class.to_ascii_lowercase(),
                Taxonomy {
                    swc: entry.swc,
                    cwe: entry.cwe,
                    owasp_sc: entry.owasp_sc,
                },
            )
        })
        .collect())
}

/// Loads `fp_priors.json`: vulnerability class → prior false-positive
/// probability. Values outside `[0,1]` are clamped rather than rejected,
/// matching the conservative-clamp policy used elsewhere for
/// adapter-provided numbers.
pub fn load_fp_priors(path: &Path) -> AocResult<HashMap<String, f64>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AocError::InputInvalid(format!("reading {}: {e}", path.display())))?;
    let entries: HashMap<String, f64> = serde_json::from_str(&raw)
        .map_err(|e| AocError::InputInvalid(format!("parsing {}: {e}", path.display())))?;
    Ok(entries
        .into_iter()
        .map(|(k, v)| (k, v.clamp(0.0, 1.0)))
        .collect())
}

/// Loads `compliance_map.json`: taxonomy id → list of compliance control ids.
pub fn load_compliance_map(path: &Path) -> AocResult<HashMap<String, Vec<String>>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AocError::InputInvalid(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| AocError::InputInvalid(format!("parsing {}: {e}", path.display())))
}

/// Loads `severity_map.json`: `tool_id -> (native label -> normalized
/// label)`. Per-tool overrides of the generic keyword fallback in
/// `finding::normalize_severity` for tools whose native vocabulary doesn't
/// match the common "info/low/medium/high/critical" spellings.
pub fn load_severity_map(path: &Path) -> AocResult<HashMap<String, HashMap<String, String>>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AocError::InputInvalid(format!("reading {}: {e}", path.display())))?;
    let entries: HashMap<String, HashMap<String, String>> = serde_json::from_str(&raw)
        .map_err(|e| AocError::InputInvalid(format!("parsing {}: {e}", path.display())))?;
    Ok(entries
        .into_iter()
        .map(|(tool, labels)| {
            let labels = labels
                .into_iter()
                .map(|(native, normalized)| (native.to_ascii_lowercase(), normalized))
                .collect();
            (tool, labels)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fp_priors_are_clamped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"slither-eq.reentrancy": 1.5, "mythril-eq.oob": -0.2}}"#).unwrap();
        let priors = load_fp_priors(file.path()).unwrap();
        assert_eq!(priors["slither-eq.reentrancy"], 1.0);
        assert_eq!(priors["mythril-eq.oob"], 0.0);
    }

    #[test]
    fn taxonomy_map_lowercases_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"Reentrancy-ETH": {{"swc": "SWC-107", "cwe": "CWE-841"}}}}"#
        )
        .unwrap();
        let map = load_taxonomy_map(file.path()).unwrap();
        assert_eq!(map["reentrancy-eth"].swc.as_deref(), Some("SWC-107"));
    }

    #[test]
    fn severity_map_lowercases_native_labels() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mythril-eq": {{"Severity.HIGH": "high"}}}}"#).unwrap();
        let map = load_severity_map(file.path()).unwrap();
        assert_eq!(
            map["mythril-eq"].get("severity.high").map(String::as_str),
            Some("high")
        );
    }
}
