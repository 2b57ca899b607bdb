//! Technique catalog entries.
//!
//! A [`Technique`] is an immutable record describing one attack technique:
//! where it applies, what it needs, what it yields, and how it relates to
//! the rest of the catalog (family, prerequisites, benchmark prior).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shape of a catalog technique identifier: `AP-TX-<DOMAIN>-<CATEGORY>-<SHORTNAME>`.
static TECHNIQUE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^AP-TX-[A-Z]{2,8}-[A-Z0-9]{2,12}-[A-Z0-9]+(-[A-Z0-9]+)*$").expect("valid regex"));

/// Shape of a MITRE ATLAS reference: `AML.T0051`, `AML.T0051.001`, `AML.TA0009`.
static ATLAS_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^AML\.(T|TA)\d{4}(\.\d{3})?$").expect("valid regex"));

/// Attack domain a technique belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttackDomain {
    /// Prompt-level attacks against language models.
    Llm,
    /// Attacks against agentic systems (tool use, autonomy).
    Agent,
    /// Classical adversarial machine learning.
    Aml,
}

impl fmt::Display for AttackDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Llm => write!(f, "llm"),
            Self::Agent => write!(f, "agent"),
            Self::Aml => write!(f, "aml"),
        }
    }
}

impl FromStr for AttackDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llm" => Ok(Self::Llm),
            "agent" => Ok(Self::Agent),
            "aml" => Ok(Self::Aml),
            other => Err(format!("unknown attack domain: {other}")),
        }
    }
}

/// Surface a technique operates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Surface {
    Model,
    Data,
    Retrieval,
    Tool,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Data => write!(f, "data"),
            Self::Retrieval => write!(f, "retrieval"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

impl FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(Self::Model),
            "data" => Ok(Self::Data),
            "retrieval" => Ok(Self::Retrieval),
            "tool" => Ok(Self::Tool),
            other => Err(format!("unknown surface: {other}")),
        }
    }
}

/// Kind of system under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Chatbot,
    Rag,
    Agent,
    CodeAssistant,
    Classifier,
    GenericModel,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chatbot => write!(f, "chatbot"),
            Self::Rag => write!(f, "rag"),
            Self::Agent => write!(f, "agent"),
            Self::CodeAssistant => write!(f, "code-assistant"),
            Self::Classifier => write!(f, "classifier"),
            Self::GenericModel => write!(f, "generic-model"),
        }
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chatbot" => Ok(Self::Chatbot),
            "rag" => Ok(Self::Rag),
            "agent" => Ok(Self::Agent),
            "code-assistant" => Ok(Self::CodeAssistant),
            "classifier" => Ok(Self::Classifier),
            "generic-model" => Ok(Self::GenericModel),
            other => Err(format!("unknown target kind: {other}")),
        }
    }
}

/// Operator access to the target.
///
/// Ordered: `BlackBox < GrayBox < WhiteBox`. An operator with a given level
/// satisfies any technique requiring that level or less.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    BlackBox,
    GrayBox,
    WhiteBox,
}

impl AccessLevel {
    /// Whether this (available) access level satisfies a required minimum.
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }

    /// Numeric rank used by access-fit scoring.
    pub fn rank(self) -> u8 {
        match self {
            Self::BlackBox => 0,
            Self::GrayBox => 1,
            Self::WhiteBox => 2,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlackBox => write!(f, "black-box"),
            Self::GrayBox => write!(f, "gray-box"),
            Self::WhiteBox => write!(f, "white-box"),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "black-box" => Ok(Self::BlackBox),
            "gray-box" => Ok(Self::GrayBox),
            "white-box" => Ok(Self::WhiteBox),
            other => Err(format!("unknown access level: {other}")),
        }
    }
}

/// Operator goal a technique can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Goal {
    Jailbreak,
    Extraction,
    Hijacking,
    Evasion,
    Poisoning,
    Exfiltration,
    PrivilegeEscalation,
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jailbreak => write!(f, "jailbreak"),
            Self::Extraction => write!(f, "extraction"),
            Self::Hijacking => write!(f, "hijacking"),
            Self::Evasion => write!(f, "evasion"),
            Self::Poisoning => write!(f, "poisoning"),
            Self::Exfiltration => write!(f, "exfiltration"),
            Self::PrivilegeEscalation => write!(f, "privilege-escalation"),
        }
    }
}

impl FromStr for Goal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jailbreak" => Ok(Self::Jailbreak),
            "extraction" => Ok(Self::Extraction),
            "hijacking" => Ok(Self::Hijacking),
            "evasion" => Ok(Self::Evasion),
            "poisoning" => Ok(Self::Poisoning),
            "exfiltration" => Ok(Self::Exfiltration),
            "privilege-escalation" => Ok(Self::PrivilegeEscalation),
            other => Err(format!("unknown goal: {other}")),
        }
    }
}

/// Declared execution cost of a technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cost {
    Low,
    Medium,
    High,
}

impl Cost {
    /// Normalized penalty used by the scorer: low=0, medium=0.5, high=1.
    pub fn penalty(self) -> f64 {
        match self {
            Self::Low => 0.0,
            Self::Medium => 0.5,
            Self::High => 1.0,
        }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// How conspicuous a technique is when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StealthProfile {
    Overt,
    Moderate,
    Stealthy,
}

impl fmt::Display for StealthProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overt => write!(f, "overt"),
            Self::Moderate => write!(f, "moderate"),
            Self::Stealthy => write!(f, "stealthy"),
        }
    }
}

/// External tool that can execute a technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolSupport {
    Garak,
    Promptfoo,
    Pyrit,
    Manual,
}

impl fmt::Display for ToolSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Garak => write!(f, "garak"),
            Self::Promptfoo => write!(f, "promptfoo"),
            Self::Pyrit => write!(f, "pyrit"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// A prerequisite entry as classified from its raw catalog string.
///
/// Strings shaped like technique identifiers must resolve against the
/// catalog; anything else is a named condition assumed to be establishable
/// outside the catalog (e.g. `session-established`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// Reference to another catalog technique.
    Technique(String),
    /// Named environmental condition.
    Condition(String),
}

impl Prerequisite {
    /// Classify a raw prerequisite string.
    pub fn classify(raw: &str) -> Self {
        if is_technique_id(raw) {
            Self::Technique(raw.to_string())
        } else {
            Self::Condition(raw.to_string())
        }
    }
}

/// Whether a string has the shape of a catalog technique identifier.
pub fn is_technique_id(s: &str) -> bool {
    TECHNIQUE_ID_RE.is_match(s)
}

/// Whether a string is a well-formed MITRE ATLAS reference.
pub fn is_atlas_ref(s: &str) -> bool {
    ATLAS_REF_RE.is_match(s)
}

/// Compliance framework references carried by a technique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComplianceRefs {
    /// OWASP Top 10 for LLM Applications entries (e.g. `LLM01`).
    #[serde(default)]
    pub owasp_llm: Vec<String>,
    /// NIST AI Risk Management Framework entries (e.g. `MAP-5.1`).
    #[serde(default)]
    pub nist_ai_rmf: Vec<String>,
    /// EU AI Act articles (e.g. `Art-15`).
    #[serde(default)]
    pub eu_ai_act: Vec<String>,
}

/// One immutable catalog entry.
///
/// Catalog documents parse records strictly: unknown keys are rejected so a
/// typo in a catalog file fails loudly instead of silently dropping data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Technique {
    /// Stable identifier, `AP-TX-<DOMAIN>-<CATEGORY>-<SHORTNAME>`.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    pub domain: AttackDomain,
    pub surface: Surface,
    /// Target kinds this technique applies to. Empty means any kind
    /// (domain consistency still applies during filtering).
    #[serde(default)]
    pub target_kinds: Vec<TargetKind>,
    /// Minimum access level the operator needs.
    pub min_access: AccessLevel,
    /// Goals this technique can serve. Never empty in a valid catalog.
    pub goals: Vec<Goal>,
    pub cost: Cost,
    pub stealth: StealthProfile,
    /// Defense flags this technique ignores (e.g. `has_moderation`).
    #[serde(default)]
    pub bypasses_defenses: Vec<String>,
    /// Information yield of an attempt result, in [0,1].
    pub signal_value: f64,
    /// Likelihood of tripping monitoring, in [0,1].
    pub detection_risk: f64,
    /// Tools able to execute this technique.
    #[serde(default)]
    pub tools: Vec<ToolSupport>,
    /// MITRE ATLAS references.
    #[serde(default)]
    pub atlas_refs: Vec<String>,
    #[serde(default)]
    pub compliance: ComplianceRefs,
    /// Family identifier for correlated posterior updates.
    pub family: String,
    /// Raw prerequisite strings: technique ids or named conditions.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Key into the benchmark prior library, if calibrated.
    #[serde(default)]
    pub prior_key: Option<String>,
    /// Narrative fragment used when assembling chain descriptions.
    #[serde(default)]
    pub narrative: Option<String>,
}

impl Technique {
    /// Whether this technique declares itself applicable to any target kind.
    pub fn applies_to_any_kind(&self) -> bool {
        self.target_kinds.is_empty()
    }

    /// Prerequisites classified into technique references and conditions.
    pub fn classified_prerequisites(&self) -> Vec<Prerequisite> {
        self.prerequisites
            .iter()
            .map(|p| Prerequisite::classify(p))
            .collect()
    }

    /// Narrative fragment for chain assembly, falling back to the name.
    pub fn narrative_fragment(&self) -> String {
        self.narrative
            .clone()
            .unwrap_or_else(|| format!("apply {}", self.name.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_ordering() {
        assert!(AccessLevel::WhiteBox.satisfies(AccessLevel::BlackBox));
        assert!(AccessLevel::GrayBox.satisfies(AccessLevel::GrayBox));
        assert!(!AccessLevel::BlackBox.satisfies(AccessLevel::GrayBox));
        assert_eq!(AccessLevel::WhiteBox.rank(), 2);
    }

    #[test]
    fn test_technique_id_shape() {
        assert!(is_technique_id("AP-TX-LLM-EXTRACT-SYSPROMPT"));
        assert!(is_technique_id("AP-TX-AGENT-PRIV-TOOL-CHAIN"));
        assert!(!is_technique_id("AP-TX-llm-EXTRACT-SYSPROMPT"));
        assert!(!is_technique_id("TX-LLM-EXTRACT-SYSPROMPT"));
        assert!(!is_technique_id("session-established"));
    }

    #[test]
    fn test_atlas_ref_shape() {
        assert!(is_atlas_ref("AML.T0051"));
        assert!(is_atlas_ref("AML.T0051.001"));
        assert!(is_atlas_ref("AML.TA0009"));
        assert!(!is_atlas_ref("AML.T51"));
        assert!(!is_atlas_ref("ATT&CK.T1059"));
    }

    #[test]
    fn test_prerequisite_classification() {
        assert_eq!(
            Prerequisite::classify("AP-TX-LLM-EXTRACT-SYSPROMPT"),
            Prerequisite::Technique("AP-TX-LLM-EXTRACT-SYSPROMPT".to_string())
        );
        assert_eq!(
            Prerequisite::classify("session-established"),
            Prerequisite::Condition("session-established".to_string())
        );
    }

    #[test]
    fn test_enum_serde_round_trip() {
        let kind: TargetKind = serde_yaml::from_str("code-assistant").unwrap();
        assert_eq!(kind, TargetKind::CodeAssistant);
        assert_eq!(serde_yaml::to_string(&kind).unwrap().trim(), "code-assistant");

        let access: AccessLevel = serde_yaml::from_str("black-box").unwrap();
        assert_eq!(access, AccessLevel::BlackBox);

        let goal: Goal = serde_yaml::from_str("privilege-escalation").unwrap();
        assert_eq!(goal, Goal::PrivilegeEscalation);
    }

    #[test]
    fn test_cost_penalty() {
        assert_eq!(Cost::Low.penalty(), 0.0);
        assert_eq!(Cost::Medium.penalty(), 0.5);
        assert_eq!(Cost::High.penalty(), 1.0);
    }

    #[test]
    fn test_strict_record_rejects_unknown_keys() {
        let yaml = r"
id: AP-TX-LLM-JB-DAN
name: DAN Persona
domain: llm
surface: model
min_access: black-box
goals: [jailbreak]
cost: low
stealth: overt
signal_value: 0.7
detection_risk: 0.6
family: jailbreak-persona
bogus_key: true
";
        let parsed: Result<Technique, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }
}
