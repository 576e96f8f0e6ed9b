//! AuditPlan, profile resolution defaults, and the audit lifecycle state
//! machine (spec §3 "AuditPlan", "AuditState"; §4.7 "Profile resolution").

use crate::error::{AocError, AocResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Quick,
    Standard,
    Full,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossLayerMode {
    Sequential,
    Pipelined,
}

impl Default for CrossLayerMode {
    fn default() -> Self {
        CrossLayerMode::Sequential
    }
}

/// A contract reference: either a filesystem path or an inline source blob
/// with a logical id (spec §3 "AuditPlan.target").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContractRef {
    Path(String),
    Inline { logical_id: String, source: String },
}

impl ContractRef {
    pub fn display_name(&self) -> String {
        match self {
            ContractRef::Path(p) => p.clone(),
            ContractRef::Inline { logical_id, .. } => logical_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPlan {
    pub audit_id: String,
    pub target: ContractRef,
    pub profile: Profile,
    pub layers: Vec<u8>,
    /// Tool ids per layer, after availability filtering (spec §3).
    pub tools_by_layer: HashMap<u8, Vec<String>>,
    pub global_deadline: Duration,
    pub per_tool_deadlines: HashMap<String, Duration>,
    pub max_parallel_per_layer: u32,
    pub cross_layer_mode: CrossLayerMode,
}

/// Defaults for each named profile (spec §4.7).
pub struct ProfileDefaults {
    pub layers: Vec<u8>,
    pub per_tool_deadline: Duration,
    pub global_deadline: Duration,
}

pub fn profile_defaults(profile: Profile) -> AocResult<ProfileDefaults> {
    match profile {
        Profile::Quick => Ok(ProfileDefaults {
            layers: vec![1],
            per_tool_deadline: Duration::from_secs(60),
            global_deadline: Duration::from_secs(5 * 60),
        }),
        Profile::Standard => Ok(ProfileDefaults {
            layers: vec![1, 2, 3],
            per_tool_deadline: Duration::from_secs(300),
            global_deadline: Duration::from_secs(30 * 60),
        }),
        Profile::Full => Ok(ProfileDefaults {
            layers: (1..=9).collect(),
            per_tool_deadline: Duration::from_secs(900),
            global_deadline: Duration::from_secs(4 * 60 * 60),
        }),
        Profile::Custom => Err(AocError::InputInvalid(
            "custom profile has no built-in defaults; caller must supply layers and deadlines"
                .to_string(),
        )),
    }
}

/// Validates a `custom` profile's caller-supplied plan shape (spec §4.7:
/// "the coordinator validates non-empty layers and non-zero global
/// deadline").
pub fn validate_custom(layers: &[u8], global_deadline: Duration) -> AocResult<()> {
    if layers.is_empty() {
        return Err(AocError::InputInvalid(
            "custom profile requires at least one layer".to_string(),
        ));
    }
    if global_deadline.is_zero() {
        return Err(AocError::InputInvalid(
            "custom profile requires a non-zero global deadline".to_string(),
        ));
    }
    Ok(())
}

/// The audit lifecycle state machine (spec §3 "AuditState").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditState {
    Created,
    Planned,
    Running,
    Correlating,
    Completed,
    Cancelled,
    Failed,
}

impl AuditState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AuditState::Completed | AuditState::Cancelled | AuditState::Failed
        )
    }

    /// Legal forward transitions; illegal transitions are a coordinator bug,
    /// not a caller-facing error.
    pub fn can_transition_to(self, next: AuditState) -> bool {
        use AuditState::*;
        matches!(
            (self, next),
            (Created, Planned)
                | (Planned, Running)
                | (Running, Correlating)
                | (Running, Cancelled)
                | (Running, Failed)
                | (Correlating, Completed)
                | (Correlating, Cancelled)
                | (Correlating, Failed)
        )
    }
}

/// Final report status surfaced to callers (spec §7 "User-visible
/// behavior").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    PartialTimeout,
    Cancelled,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_profile_has_expected_defaults() {
        let defaults = profile_defaults(Profile::Quick).unwrap();
        assert_eq!(defaults.layers, vec![1]);
        assert_eq!(defaults.global_deadline, Duration::from_secs(300));
    }

    #[test]
    fn custom_profile_has_no_defaults() {
        assert!(profile_defaults(Profile::Custom).is_err());
    }

    #[test]
    fn custom_validation_rejects_empty_layers() {
        assert!(validate_custom(&[], Duration::from_secs(60)).is_err());
    }

    #[test]
    fn custom_validation_rejects_zero_deadline() {
        assert!(validate_custom(&[1], Duration::ZERO).is_err());
    }

    #[test]
    fn state_machine_allows_known_transitions_only() {
        assert!(AuditState::Created.can_transition_to(AuditState::Planned));
        assert!(!AuditState::Created.can_transition_to(AuditState::Completed));
        assert!(AuditState::Correlating.can_transition_to(AuditState::Completed));
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(AuditState::Completed.is_terminal());
        assert!(!AuditState::Running.is_terminal());
    }
}
