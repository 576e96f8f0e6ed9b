use serde::{Deserialize, Serialize};

/// Normalized severity scale (spec §3, Finding.severity_normalized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// One level down, floored at `Low` (spec §4.6 step 6: demotion never
    /// reaches `Info` through confidence demotion).
    pub fn demote(self) -> Severity {
        match self {
            Severity::Critical => Severity::High,
            Severity::High => Severity::Medium,
            Severity::Medium => Severity::Low,
            Severity::Low => Severity::Low,
            Severity::Info => Severity::Info,
        }
    }

    /// One level up, capped at `Critical`.
    pub fn promote(self) -> Severity {
        match self {
            Severity::Info => Severity::Low,
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High => Severity::Critical,
            Severity::Critical => Severity::Critical,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_info_lowest() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn demote_never_drops_below_low() {
        assert_eq!(Severity::Low.demote(), Severity::Low);
        assert_eq!(Severity::High.demote(), Severity::Medium);
    }

    #[test]
    fn promote_caps_at_critical() {
        assert_eq!(Severity::Critical.promote(), Severity::Critical);
        assert_eq!(Severity::Medium.promote(), Severity::High);
    }
}
