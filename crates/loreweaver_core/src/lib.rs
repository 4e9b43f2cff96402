pub mod config;
pub mod state;

pub use config::LoreweaverConfig;
pub use state::{CharacterState, StatePatch, StateValue};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A character in the story world. `core_psychology` is immutable once the
/// character is created; `current_state` is only ever changed through a
/// [`StatePatch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub core_psychology: String,
    pub current_state: CharacterState,
}

/// Where a world rule applies: everywhere, or at one named location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleScope {
    Global,
    Location(String),
}

impl RuleScope {
    /// Parse the persisted scope string. The literal `"global"` is reserved;
    /// anything else is a location name.
    pub fn parse(raw: &str) -> Self {
        if raw == "global" {
            RuleScope::Global
        } else {
            RuleScope::Location(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuleScope::Global => "global",
            RuleScope::Location(loc) => loc,
        }
    }

    /// Whether a rule with this scope is in force at `location`.
    pub fn applies_to(&self, location: &str) -> bool {
        match self {
            RuleScope::Global => true,
            RuleScope::Location(loc) => loc == location,
        }
    }
}

/// A world rule. Read-only during generation.
#[derive(Debug, Clone)]
pub struct WorldRule {
    pub id: String,
    pub category: String,
    pub rule_text: String,
    pub active_scope: RuleScope,
}

/// A story project. Owns its scenes; deleting a project cascades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: i64,
}

/// A committed timeline event. Created exactly once at commit time and
/// immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub project_id: String,
    pub sequence_index: i64,
    pub prompt: String,
    pub scene_text: String,
    pub critic_report: Option<CriticReport>,
    pub location: String,
    pub participants: Vec<String>,
    pub summary: String,
    pub created_at: i64,
}

/// An approved scene waiting to be committed. The sequence index is not part
/// of this struct: it is assigned by the store at staging time.
#[derive(Debug, Clone)]
pub struct NewScene {
    pub id: String,
    pub project_id: String,
    pub prompt: String,
    pub scene_text: String,
    pub critic_report: Option<CriticReport>,
    pub location: String,
    pub participants: Vec<String>,
    pub summary: String,
    pub semantic_intent: String,
    pub causal_prereqs: Vec<String>,
}

/// The structured plan the Planner produces before any prose is generated.
/// Lives only for the duration of one generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneOutline {
    pub intent_summary: String,
    pub target_emotional_shift: String,
    pub required_actions: Vec<String>,
}

/// Consistency metrics reported by the Critic. `trait_adherence_score` is
/// observability only; approval is decided by [`CriticReport::approved`]
/// alone, never by a score threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticMetrics {
    pub trait_adherence_score: f32,
    pub temporal_continuity_flags: u32,
    pub state_drift_detected: Vec<String>,
}

impl Default for CriticMetrics {
    fn default() -> Self {
        Self {
            trait_adherence_score: 0.0,
            temporal_continuity_flags: 0,
            state_drift_detected: Vec::new(),
        }
    }
}

/// The Critic's verdict on one draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticReport {
    pub approved: bool,
    #[serde(default)]
    pub metrics: CriticMetrics,
    #[serde(default)]
    pub justification: String,
}

impl CriticReport {
    /// Fail-closed report: used whenever the critic backend could not
    /// produce a valid verdict. A parse failure must never read as approval.
    pub fn rejected(justification: impl Into<String>) -> Self {
        Self {
            approved: false,
            metrics: CriticMetrics::default(),
            justification: justification.into(),
        }
    }
}

// ============================================================================
// External collaborators
// ============================================================================

/// The authenticated caller, as resolved by the external auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken,
}

/// Session resolution is an external concern; the gateway only consumes
/// this contract.
#[async_trait]
pub trait Auth: Send + Sync {
    async fn current_user(&self, bearer_token: Option<&str>) -> Result<CurrentUser, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_scope_global_applies_everywhere() {
        let scope = RuleScope::parse("global");
        assert_eq!(scope, RuleScope::Global);
        assert!(scope.applies_to("tavern"));
        assert!(scope.applies_to("docks"));
    }

    #[test]
    fn rule_scope_location_applies_only_there() {
        let scope = RuleScope::parse("tavern");
        assert!(scope.applies_to("tavern"));
        assert!(!scope.applies_to("docks"));
    }

    #[test]
    fn rule_scope_round_trips_through_str() {
        for raw in ["global", "tavern", "the old mill"] {
            assert_eq!(RuleScope::parse(raw).as_str(), raw);
        }
    }

    #[test]
    fn critic_report_rejected_is_fail_closed() {
        let report = CriticReport::rejected("backend unreachable");
        assert!(!report.approved);
        assert_eq!(report.justification, "backend unreachable");
        assert_eq!(report.metrics.temporal_continuity_flags, 0);
    }

    #[test]
    fn scene_outline_requires_all_three_fields() {
        let ok = r#"{"intent_summary":"a","target_emotional_shift":"b","required_actions":["c"]}"#;
        assert!(serde_json::from_str::<SceneOutline>(ok).is_ok());

        let missing = r#"{"intent_summary":"a","required_actions":[]}"#;
        assert!(serde_json::from_str::<SceneOutline>(missing).is_err());
    }

    #[test]
    fn critic_report_tolerates_missing_metrics() {
        // Backends sometimes return a bare verdict; missing sections default
        // rather than failing the parse.
        let raw = r#"{"approved":true}"#;
        let report: CriticReport = serde_json::from_str(raw).unwrap();
        assert!(report.approved);
        assert!(report.justification.is_empty());
    }
}
