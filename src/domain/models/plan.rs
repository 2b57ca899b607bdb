//! Plan, recommendation, and chain result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::technique::ToolSupport;

/// Per-dimension weighted contributions behind a technique's base score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub compatibility: f64,
    pub access_fit: f64,
    pub goal_alignment: f64,
    pub defense_bypass: f64,
    pub signal_gain: f64,
    /// Weighted penalty (subtracted from the total).
    pub cost_penalty: f64,
    /// Weighted penalty (subtracted from the total).
    pub detection_risk: f64,
}

impl ScoreBreakdown {
    /// Positive contributions as (dimension name, weighted value) pairs.
    pub fn positive_contributions(&self) -> [(&'static str, f64); 5] {
        [
            ("compatibility", self.compatibility),
            ("access_fit", self.access_fit),
            ("goal_alignment", self.goal_alignment),
            ("defense_bypass", self.defense_bypass),
            ("signal_gain", self.signal_gain),
        ]
    }
}

/// A technique with its base fit score, before Thompson sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTechnique {
    pub technique_id: String,
    pub total: f64,
    pub breakdown: ScoreBreakdown,
    pub rationale: String,
}

/// A ready-to-run invocation stub for a supported external tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHook {
    pub tool: ToolSupport,
    pub command: String,
}

/// One ranked recommendation in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub technique_id: String,
    pub name: String,
    /// Blend of normalized base score and Thompson sample.
    pub final_score: f64,
    pub base_score: f64,
    pub thompson_sample: f64,
    pub breakdown: ScoreBreakdown,
    pub posterior_mean: f64,
    pub wilson_lower: f64,
    pub wilson_upper: f64,
    /// Standardized deviation of the posterior mean from its prior.
    pub z_score: f64,
    pub hooks: Vec<ExecutionHook>,
    pub rationale: String,
}

/// Why a plan came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanReason {
    /// The admissibility filter removed every catalog technique.
    NoAdmissibleTechniques,
}

/// A ranked plan for a target. An empty plan with a reason is a valid,
/// structured outcome — not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub target_name: String,
    pub entries: Vec<Recommendation>,
    #[serde(default)]
    pub reason: Option<PlanReason>,
    pub generated_at: DateTime<Utc>,
}

/// A logged recommendation batch within a campaign.
///
/// `after_attempts` is the attempt-log watermark when the batch was
/// generated; replay regenerates each batch at the same watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationBatch {
    pub sequence: u32,
    pub after_attempts: u32,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<Recommendation>,
}

impl RecommendationBatch {
    /// Ranking equality: same techniques in the same order with the same
    /// scores (within float tolerance). Timestamps are reporting metadata
    /// and excluded deliberately.
    pub fn same_ranking(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(a, b)| {
                    a.technique_id == b.technique_id
                        && (a.final_score - b.final_score).abs() < 1e-9
                })
    }
}

/// One step of a multi-stage attack chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStep {
    pub technique_id: String,
    /// Step success probability after any family-correlation bonus.
    pub probability: f64,
    pub family: String,
}

/// A multi-stage attack sequence from the chain planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackChain {
    pub steps: Vec<ChainStep>,
    /// Product of step probabilities.
    pub joint_probability: f64,
    pub narrative: String,
}

impl AttackChain {
    pub fn technique_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.technique_id.as_str()).collect()
    }
}

/// Outcome of perturbing one scoring weight by ±20%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub dimension: String,
    /// Kendall-τ against the baseline ranking with the weight at −20%.
    pub tau_down: f64,
    /// Kendall-τ against the baseline ranking with the weight at +20%.
    pub tau_up: f64,
    /// Either τ fell below the 0.7 stability threshold.
    pub rank_sensitive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recommendation(id: &str, score: f64) -> Recommendation {
        Recommendation {
            technique_id: id.to_string(),
            name: id.to_string(),
            final_score: score,
            base_score: score,
            thompson_sample: score,
            breakdown: ScoreBreakdown::default(),
            posterior_mean: 0.5,
            wilson_lower: 0.0,
            wilson_upper: 1.0,
            z_score: 0.0,
            hooks: vec![],
            rationale: String::new(),
        }
    }

    #[test]
    fn test_same_ranking_ignores_timestamps() {
        let a = RecommendationBatch {
            sequence: 0,
            after_attempts: 0,
            generated_at: Utc::now(),
            entries: vec![recommendation("AP-TX-LLM-JB-DAN", 0.9)],
        };
        let mut b = a.clone();
        b.generated_at = Utc::now();
        assert!(a.same_ranking(&b));
    }

    #[test]
    fn test_same_ranking_detects_reorder() {
        let a = RecommendationBatch {
            sequence: 0,
            after_attempts: 0,
            generated_at: Utc::now(),
            entries: vec![
                recommendation("AP-TX-LLM-JB-DAN", 0.9),
                recommendation("AP-TX-LLM-JB-GRANDMA", 0.8),
            ],
        };
        let mut b = a.clone();
        b.entries.swap(0, 1);
        assert!(!a.same_ranking(&b));
    }
}
