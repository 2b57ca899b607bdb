//! Target profiles and their validation.
//!
//! A target document is a declarative description of the system under test.
//! Validation is all-at-once: every violated invariant is reported in a
//! single pass rather than failing on the first problem. Unknown top-level
//! document fields are forward-compatibility warnings, not errors.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::technique::{AccessLevel, Goal, TargetKind};

/// Target document schema version this runtime understands.
pub const TARGET_SCHEMA_VERSION: &str = "1.0";

/// Defense flags the planner recognizes.
pub const KNOWN_DEFENSE_FLAGS: &[&str] = &[
    "has_moderation",
    "has_input_filtering",
    "has_output_filtering",
    "has_retrieval_filtering",
    "has_rate_limiting",
    "has_system_prompt_hardening",
    "has_tool_sandboxing",
];

/// How much the operator cares about staying undetected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StealthPriority {
    Low,
    #[default]
    Moderate,
    High,
}

impl StealthPriority {
    /// Scale factor applied to declared detection risk during scoring.
    pub fn risk_multiplier(self) -> f64 {
        match self {
            Self::Low => 0.33,
            Self::Moderate => 0.67,
            Self::High => 1.0,
        }
    }
}

impl fmt::Display for StealthPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Moderate => write!(f, "moderate"),
            Self::High => write!(f, "high"),
        }
    }
}

impl FromStr for StealthPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "moderate" => Ok(Self::Moderate),
            "high" => Ok(Self::High),
            other => Err(format!("unknown stealth priority: {other}")),
        }
    }
}

/// A validated target description.
///
/// Once snapshot into a campaign, a profile is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub name: String,
    pub kind: TargetKind,
    pub access: AccessLevel,
    /// Operator goals. Never empty in a valid profile.
    pub goals: BTreeSet<Goal>,
    /// Defense flag → active. Keys are from [`KNOWN_DEFENSE_FLAGS`].
    #[serde(default)]
    pub defenses: BTreeMap<String, bool>,
    /// Attempt budget ceiling, if the operator declared one.
    #[serde(default)]
    pub max_queries: Option<u32>,
    #[serde(default)]
    pub stealth_priority: StealthPriority,
    /// Free-form attributes; consumed only by meta-learning similarity.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl TargetProfile {
    pub fn new(
        name: impl Into<String>,
        kind: TargetKind,
        access: AccessLevel,
        goals: impl IntoIterator<Item = Goal>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            access,
            goals: goals.into_iter().collect(),
            defenses: BTreeMap::new(),
            max_queries: None,
            stealth_priority: StealthPriority::default(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_defense(mut self, flag: &str, active: bool) -> Self {
        self.defenses.insert(flag.to_string(), active);
        self
    }

    pub fn with_max_queries(mut self, max_queries: u32) -> Self {
        self.max_queries = Some(max_queries);
        self
    }

    pub fn with_stealth_priority(mut self, priority: StealthPriority) -> Self {
        self.stealth_priority = priority;
        self
    }

    /// Names of defense flags currently active on this target.
    pub fn active_defenses(&self) -> Vec<&str> {
        self.defenses
            .iter()
            .filter(|(_, &active)| active)
            .map(|(flag, _)| flag.as_str())
            .collect()
    }
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TargetViolation {
    #[error("name must not be empty")]
    EmptyName,

    #[error("schema_version is missing")]
    MissingSchemaVersion,

    #[error("unsupported schema_version: {0} (expected {TARGET_SCHEMA_VERSION})")]
    UnsupportedSchemaVersion(String),

    #[error("unknown target kind: {0}")]
    UnknownKind(String),

    #[error("unknown access level: {0}")]
    UnknownAccessLevel(String),

    #[error("goals must not be empty")]
    EmptyGoals,

    #[error("unknown goal: {0}")]
    UnknownGoal(String),

    #[error("unknown defense flag: {0}")]
    UnknownDefenseFlag(String),

    #[error("max_queries must be positive, got {0}")]
    NonPositiveMaxQueries(i64),

    #[error("unknown stealth priority: {0}")]
    UnknownStealthPriority(String),
}

/// Invalid target document; carries every violated invariant.
#[derive(Debug, Clone, Error)]
#[error("target validation failed with {} violation(s): {}", .violations.len(), format_violations(.violations))]
pub struct TargetValidationError {
    pub violations: Vec<TargetViolation>,
}

fn format_violations(violations: &[TargetViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Raw declarative target document as authored by the operator.
///
/// Enum-valued fields stay strings here so validation can report unknown
/// literals as violations instead of opaque parse errors. Unrecognized
/// top-level fields land in `extra` and become warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetDocument {
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub access: String,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub defenses: BTreeMap<String, bool>,
    #[serde(default)]
    pub max_queries: Option<i64>,
    #[serde(default)]
    pub stealth_priority: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl TargetDocument {
    /// Parse a YAML (or JSON) document.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Forward-compatibility warnings for unrecognized top-level fields.
    pub fn unknown_field_warnings(&self) -> Vec<String> {
        self.extra
            .keys()
            .map(|key| format!("unknown target field ignored: {key}"))
            .collect()
    }

    /// Validate every invariant and produce a [`TargetProfile`].
    pub fn validate(&self) -> Result<TargetProfile, TargetValidationError> {
        let mut violations = Vec::new();

        if self.name.trim().is_empty() {
            violations.push(TargetViolation::EmptyName);
        }

        match self.schema_version.as_deref() {
            None => violations.push(TargetViolation::MissingSchemaVersion),
            Some(TARGET_SCHEMA_VERSION) => {}
            Some(other) => {
                violations.push(TargetViolation::UnsupportedSchemaVersion(other.to_string()));
            }
        }

        let kind = match self.kind.parse::<TargetKind>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                violations.push(TargetViolation::UnknownKind(self.kind.clone()));
                None
            }
        };

        let access = match self.access.parse::<AccessLevel>() {
            Ok(access) => Some(access),
            Err(_) => {
                violations.push(TargetViolation::UnknownAccessLevel(self.access.clone()));
                None
            }
        };

        let mut goals = BTreeSet::new();
        if self.goals.is_empty() {
            violations.push(TargetViolation::EmptyGoals);
        }
        for raw in &self.goals {
            match raw.parse::<Goal>() {
                Ok(goal) => {
                    goals.insert(goal);
                }
                Err(_) => violations.push(TargetViolation::UnknownGoal(raw.clone())),
            }
        }

        for flag in self.defenses.keys() {
            if !KNOWN_DEFENSE_FLAGS.contains(&flag.as_str()) {
                violations.push(TargetViolation::UnknownDefenseFlag(flag.clone()));
            }
        }

        let max_queries = match self.max_queries {
            Some(n) if n < 1 => {
                violations.push(TargetViolation::NonPositiveMaxQueries(n));
                None
            }
            Some(n) => u32::try_from(n).ok(),
            None => None,
        };

        let stealth_priority = match self.stealth_priority.as_deref() {
            None => StealthPriority::default(),
            Some(raw) => match raw.parse::<StealthPriority>() {
                Ok(priority) => priority,
                Err(_) => {
                    violations.push(TargetViolation::UnknownStealthPriority(raw.to_string()));
                    StealthPriority::default()
                }
            },
        };

        if !violations.is_empty() {
            return Err(TargetValidationError { violations });
        }

        // Unwraps are safe: a missing kind/access pushed a violation above.
        Ok(TargetProfile {
            name: self.name.clone(),
            kind: kind.expect("validated"),
            access: access.expect("validated"),
            goals,
            defenses: self.defenses.clone(),
            max_queries,
            stealth_priority,
            attributes: self.attributes.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_DOC: &str = r#"
schema_version: "1.0"
name: support-bot
kind: chatbot
access: black-box
goals: [jailbreak, extraction]
defenses:
  has_moderation: true
  has_input_filtering: true
max_queries: 500
stealth_priority: moderate
"#;

    #[test]
    fn test_valid_document_produces_profile() {
        let doc = TargetDocument::from_yaml(VALID_DOC).unwrap();
        let profile = doc.validate().unwrap();

        assert_eq!(profile.name, "support-bot");
        assert_eq!(profile.kind, TargetKind::Chatbot);
        assert_eq!(profile.access, AccessLevel::BlackBox);
        assert_eq!(profile.goals.len(), 2);
        assert_eq!(profile.max_queries, Some(500));
        assert_eq!(profile.active_defenses().len(), 2);
    }

    #[test]
    fn test_empty_goals_rejected() {
        let doc = TargetDocument::from_yaml(
            r#"
schema_version: "1.0"
name: t
kind: chatbot
access: black-box
goals: []
"#,
        )
        .unwrap();

        let err = doc.validate().unwrap_err();
        assert!(err.violations.contains(&TargetViolation::EmptyGoals));
    }

    #[test]
    fn test_all_violations_reported_at_once() {
        let doc = TargetDocument::from_yaml(
            r#"
schema_version: "2.0"
name: ""
kind: mainframe
access: no-box
goals: [world-domination]
max_queries: 0
defenses:
  has_lasers: true
"#,
        )
        .unwrap();

        let err = doc.validate().unwrap_err();
        // schema version, empty name, unknown kind, unknown access,
        // unknown goal, non-positive budget, unknown defense flag
        assert_eq!(err.violations.len(), 7);
    }

    #[test]
    fn test_unknown_top_level_field_is_warning_not_error() {
        let doc = TargetDocument::from_yaml(
            r#"
schema_version: "1.0"
name: t
kind: rag
access: gray-box
goals: [extraction]
future_field: whatever
"#,
        )
        .unwrap();

        assert_eq!(doc.unknown_field_warnings().len(), 1);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_missing_schema_version_rejected() {
        let doc = TargetDocument::from_yaml(
            r"
name: t
kind: chatbot
access: black-box
goals: [jailbreak]
",
        )
        .unwrap();

        let err = doc.validate().unwrap_err();
        assert!(err
            .violations
            .contains(&TargetViolation::MissingSchemaVersion));
    }

    #[test]
    fn test_stealth_multipliers_are_monotone() {
        assert!(
            StealthPriority::Low.risk_multiplier() < StealthPriority::Moderate.risk_multiplier()
        );
        assert!(
            StealthPriority::Moderate.risk_multiplier() < StealthPriority::High.risk_multiplier()
        );
    }
}
