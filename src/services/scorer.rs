//! Seven-dimension weighted fit scoring.
//!
//! Produces a scalar base score per admissible technique plus the
//! per-dimension contributions and a short rationale. Also provides the
//! ±20% weight-perturbation sensitivity analysis with Kendall-τ rank
//! correlation against the baseline ranking.

use crate::domain::models::config::{DefenseBypassMode, ScoreWeights, ScoringConfig};
use crate::domain::models::plan::{ScoreBreakdown, ScoredTechnique, SensitivityReport};
use crate::domain::models::target::TargetProfile;
use crate::domain::models::technique::Technique;

/// A normalized dimension value below this is called out as a caveat in
/// the rationale.
const CAVEAT_THRESHOLD: f64 = 0.15;

/// Kendall-τ below this marks a dimension as rank-sensitive.
const TAU_STABLE: f64 = 0.7;

/// Service computing base fit scores for admissible techniques.
#[derive(Debug, Clone, Default)]
pub struct TechniqueScorer {
    config: ScoringConfig,
}

impl TechniqueScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn with_weights(weights: ScoreWeights) -> Self {
        Self {
            config: ScoringConfig {
                weights,
                ..ScoringConfig::default()
            },
        }
    }

    /// Score one technique against a target.
    pub fn score(&self, target: &TargetProfile, technique: &Technique) -> ScoredTechnique {
        self.score_with_weights(target, technique, &self.config.weights)
    }

    /// Score and rank a set of admissible techniques, descending.
    /// Ties break by technique id so the ordering is deterministic.
    pub fn rank(&self, target: &TargetProfile, admissible: &[&Technique]) -> Vec<ScoredTechnique> {
        self.rank_with_weights(target, admissible, &self.config.weights)
    }

    /// Perturb each weight ±20%, re-rank, and report Kendall-τ against the
    /// baseline ranking. τ < 0.7 on either side marks the dimension as
    /// rank-sensitive; that is surfaced, never treated as an error.
    pub fn sensitivity(
        &self,
        target: &TargetProfile,
        admissible: &[&Technique],
    ) -> Vec<SensitivityReport> {
        let baseline: Vec<String> = self
            .rank(target, admissible)
            .into_iter()
            .map(|s| s.technique_id)
            .collect();

        DIMENSIONS
            .iter()
            .map(|&dimension| {
                let tau_down = self.perturbed_tau(target, admissible, &baseline, dimension, 0.8);
                let tau_up = self.perturbed_tau(target, admissible, &baseline, dimension, 1.2);
                SensitivityReport {
                    dimension: dimension.to_string(),
                    tau_down,
                    tau_up,
                    rank_sensitive: tau_down < TAU_STABLE || tau_up < TAU_STABLE,
                }
            })
            .collect()
    }

    fn perturbed_tau(
        &self,
        target: &TargetProfile,
        admissible: &[&Technique],
        baseline: &[String],
        dimension: &str,
        factor: f64,
    ) -> f64 {
        let mut weights = self.config.weights;
        scale_weight(&mut weights, dimension, factor);
        let perturbed: Vec<String> = self
            .rank_with_weights(target, admissible, &weights)
            .into_iter()
            .map(|s| s.technique_id)
            .collect();
        kendall_tau(baseline, &perturbed)
    }

    fn rank_with_weights(
        &self,
        target: &TargetProfile,
        admissible: &[&Technique],
        weights: &ScoreWeights,
    ) -> Vec<ScoredTechnique> {
        let mut scored: Vec<ScoredTechnique> = admissible
            .iter()
            .map(|t| self.score_with_weights(target, t, weights))
            .collect();
        scored.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.technique_id.cmp(&b.technique_id))
        });
        scored
    }

    fn score_with_weights(
        &self,
        target: &TargetProfile,
        technique: &Technique,
        weights: &ScoreWeights,
    ) -> ScoredTechnique {
        let raw = RawDimensions::compute(target, technique, self.config.defense_bypass_mode);

        let breakdown = ScoreBreakdown {
            compatibility: weights.compatibility * raw.compatibility,
            access_fit: weights.access_fit * raw.access_fit,
            goal_alignment: weights.goal_alignment * raw.goal_alignment,
            defense_bypass: weights.defense_bypass * raw.defense_bypass,
            signal_gain: weights.signal_gain * raw.signal_gain,
            cost_penalty: weights.cost_penalty * raw.cost_penalty,
            detection_risk: weights.detection_risk * raw.detection_risk,
        };

        let total = breakdown.compatibility
            + breakdown.access_fit
            + breakdown.goal_alignment
            + breakdown.defense_bypass
            + breakdown.signal_gain
            - breakdown.cost_penalty
            - breakdown.detection_risk;

        ScoredTechnique {
            technique_id: technique.id.clone(),
            total,
            breakdown,
            rationale: raw.rationale(&breakdown),
        }
    }
}

/// Normalized (unweighted) dimension values, each in [0,1].
struct RawDimensions {
    compatibility: f64,
    access_fit: f64,
    goal_alignment: f64,
    defense_bypass: f64,
    signal_gain: f64,
    cost_penalty: f64,
    detection_risk: f64,
}

impl RawDimensions {
    fn compute(target: &TargetProfile, technique: &Technique, mode: DefenseBypassMode) -> Self {
        let compatibility = if technique.applies_to_any_kind() {
            0.6
        } else {
            1.0
        };

        let gap = f64::from(target.access.rank()) - f64::from(technique.min_access.rank());
        let access_fit = (1.0 - 0.25 * gap).clamp(0.0, 1.0);

        let overlap = technique
            .goals
            .iter()
            .filter(|g| target.goals.contains(g))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let goal_alignment = overlap as f64 / technique.goals.len().max(1) as f64;

        let active = target.active_defenses();
        let defense_bypass = if active.is_empty() {
            1.0
        } else {
            let bypassed = active
                .iter()
                .filter(|flag| technique.bypasses_defenses.iter().any(|b| b == *flag))
                .count();
            match mode {
                #[allow(clippy::cast_precision_loss)]
                DefenseBypassMode::Fraction => bypassed as f64 / active.len() as f64,
                DefenseBypassMode::AllOrNothing => {
                    if bypassed == active.len() {
                        1.0
                    } else {
                        0.0
                    }
                }
            }
        };

        Self {
            compatibility,
            access_fit,
            goal_alignment,
            defense_bypass,
            signal_gain: technique.signal_value,
            cost_penalty: technique.cost.penalty(),
            detection_risk: technique.detection_risk * target.stealth_priority.risk_multiplier(),
        }
    }

    /// Two strongest weighted positive contributions, plus caveats for any
    /// normalized positive dimension that falls below the threshold.
    fn rationale(&self, breakdown: &ScoreBreakdown) -> String {
        let mut positives = breakdown.positive_contributions();
        positives.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let leading: Vec<&str> = positives
            .iter()
            .take(2)
            .map(|(name, _)| dimension_label(name))
            .collect();

        let raw_positives = [
            ("compatibility", self.compatibility),
            ("access_fit", self.access_fit),
            ("goal_alignment", self.goal_alignment),
            ("defense_bypass", self.defense_bypass),
            ("signal_gain", self.signal_gain),
        ];
        let caveats: Vec<&str> = raw_positives
            .iter()
            .filter(|(_, value)| *value < CAVEAT_THRESHOLD)
            .map(|(name, _)| dimension_label(name))
            .collect();

        if caveats.is_empty() {
            format!("strong {} and {}", leading[0], leading[1])
        } else {
            format!(
                "strong {} and {}; weak {}",
                leading[0],
                leading[1],
                caveats.join(", ")
            )
        }
    }
}

const DIMENSIONS: &[&str] = &[
    "compatibility",
    "access_fit",
    "goal_alignment",
    "defense_bypass",
    "signal_gain",
    "cost_penalty",
    "detection_risk",
];

fn dimension_label(name: &str) -> &'static str {
    match name {
        "compatibility" => "target-kind fit",
        "access_fit" => "access fit",
        "goal_alignment" => "goal alignment",
        "defense_bypass" => "defense bypass",
        "signal_gain" => "signal yield",
        "cost_penalty" => "cost",
        _ => "detection exposure",
    }
}

fn scale_weight(weights: &mut ScoreWeights, dimension: &str, factor: f64) {
    match dimension {
        "compatibility" => weights.compatibility *= factor,
        "access_fit" => weights.access_fit *= factor,
        "goal_alignment" => weights.goal_alignment *= factor,
        "defense_bypass" => weights.defense_bypass *= factor,
        "signal_gain" => weights.signal_gain *= factor,
        "cost_penalty" => weights.cost_penalty *= factor,
        "detection_risk" => weights.detection_risk *= factor,
        _ => {}
    }
}

/// Kendall-τ rank correlation between two rankings of the same item set.
///
/// Both inputs are total orders (ties are already broken upstream), so the
/// plain pair-counting form applies: (concordant − discordant) / pairs.
pub fn kendall_tau(a: &[String], b: &[String]) -> f64 {
    let n = a.len();
    if n < 2 || b.len() != n {
        return 1.0;
    }

    let rank_b: std::collections::HashMap<&str, usize> = b
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let positions: Vec<usize> = match a
        .iter()
        .map(|id| rank_b.get(id.as_str()).copied())
        .collect::<Option<Vec<_>>>()
    {
        Some(positions) => positions,
        None => return 0.0,
    };

    let mut concordant = 0i64;
    let mut discordant = 0i64;
    for i in 0..n {
        for j in (i + 1)..n {
            if positions[i] < positions[j] {
                concordant += 1;
            } else {
                discordant += 1;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let pairs = (n * (n - 1) / 2) as f64;
    (concordant - discordant) as f64 / pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::target::StealthPriority;
    use crate::domain::models::technique::{
        AccessLevel, AttackDomain, Cost, Goal, StealthProfile, Surface, TargetKind,
    };

    fn technique(id: &str) -> Technique {
        Technique {
            id: id.to_string(),
            name: id.to_string(),
            domain: AttackDomain::Llm,
            surface: Surface::Model,
            target_kinds: vec![TargetKind::Chatbot],
            min_access: AccessLevel::BlackBox,
            goals: vec![Goal::Jailbreak],
            cost: Cost::Low,
            stealth: StealthProfile::Moderate,
            bypasses_defenses: vec![],
            signal_value: 0.5,
            detection_risk: 0.4,
            tools: vec![],
            atlas_refs: vec![],
            compliance: Default::default(),
            family: "f".to_string(),
            prerequisites: vec![],
            prior_key: None,
            narrative: None,
        }
    }

    fn target() -> TargetProfile {
        TargetProfile::new(
            "t",
            TargetKind::Chatbot,
            AccessLevel::BlackBox,
            [Goal::Jailbreak],
        )
    }

    #[test]
    fn test_exact_access_match_beats_excess_access() {
        let scorer = TechniqueScorer::default();
        let t = technique("AP-TX-LLM-JB-DAN");

        let black = scorer.score(&target(), &t);

        let mut white_target = target();
        white_target.access = AccessLevel::WhiteBox;
        let white = scorer.score(&white_target, &t);

        assert!(black.breakdown.access_fit > white.breakdown.access_fit);
    }

    #[test]
    fn test_defense_bypass_fraction() {
        let scorer = TechniqueScorer::default();
        let mut t = technique("AP-TX-LLM-JB-DAN");
        t.bypasses_defenses = vec!["has_moderation".to_string()];

        let target = target()
            .with_defense("has_moderation", true)
            .with_defense("has_input_filtering", true);

        let scored = scorer.score(&target, &t);
        let expected = ScoreWeights::default().defense_bypass * 0.5;
        assert!((scored.breakdown.defense_bypass - expected).abs() < 1e-9);
    }

    #[test]
    fn test_defense_bypass_all_or_nothing() {
        let scorer = TechniqueScorer::new(ScoringConfig {
            defense_bypass_mode: DefenseBypassMode::AllOrNothing,
            ..ScoringConfig::default()
        });
        let mut t = technique("AP-TX-LLM-JB-DAN");
        t.bypasses_defenses = vec!["has_moderation".to_string()];

        let target = target()
            .with_defense("has_moderation", true)
            .with_defense("has_input_filtering", true);

        let scored = scorer.score(&target, &t);
        assert!(scored.breakdown.defense_bypass.abs() < 1e-12);
    }

    #[test]
    fn test_no_active_defenses_scores_full_bypass() {
        let scorer = TechniqueScorer::default();
        let scored = scorer.score(&target(), &technique("AP-TX-LLM-JB-DAN"));
        let expected = ScoreWeights::default().defense_bypass;
        assert!((scored.breakdown.defense_bypass - expected).abs() < 1e-9);
    }

    #[test]
    fn test_stealth_priority_scales_detection_penalty() {
        let scorer = TechniqueScorer::default();
        let t = technique("AP-TX-LLM-JB-DAN");

        let relaxed = target().with_stealth_priority(StealthPriority::Low);
        let paranoid = target().with_stealth_priority(StealthPriority::High);

        let relaxed_score = scorer.score(&relaxed, &t);
        let paranoid_score = scorer.score(&paranoid, &t);
        assert!(relaxed_score.total > paranoid_score.total);
    }

    #[test]
    fn test_rank_ties_break_by_id() {
        let scorer = TechniqueScorer::default();
        let a = technique("AP-TX-LLM-JB-AAA");
        let b = technique("AP-TX-LLM-JB-BBB");

        let ranked = scorer.rank(&target(), &[&b, &a]);
        assert_eq!(ranked[0].technique_id, "AP-TX-LLM-JB-AAA");
    }

    #[test]
    fn test_rationale_mentions_leading_dimensions() {
        let scorer = TechniqueScorer::default();
        let mut t = technique("AP-TX-LLM-JB-DAN");
        t.signal_value = 1.0;
        let scored = scorer.score(&target(), &t);
        assert!(scored.rationale.starts_with("strong "));
    }

    #[test]
    fn test_kendall_tau_identity_and_reversal() {
        let ranking: Vec<String> = ["a", "b", "c", "d"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let mut reversed = ranking.clone();
        reversed.reverse();

        assert!((kendall_tau(&ranking, &ranking) - 1.0).abs() < 1e-12);
        assert!((kendall_tau(&ranking, &reversed) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_perturbation_gives_tau_one() {
        let scorer = TechniqueScorer::default();
        let a = technique("AP-TX-LLM-JB-AAA");
        let b = technique("AP-TX-LLM-JB-BBB");
        let admissible = vec![&a, &b];

        let baseline: Vec<String> = scorer
            .rank(&target(), &admissible)
            .into_iter()
            .map(|s| s.technique_id)
            .collect();
        let tau = scorer.perturbed_tau(&target(), &admissible, &baseline, "signal_gain", 1.0);
        assert!((tau - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sensitivity_reports_all_dimensions_with_bounded_tau() {
        let scorer = TechniqueScorer::default();
        let mut techniques = Vec::new();
        for (i, signal) in [0.9, 0.7, 0.5, 0.3].iter().enumerate() {
            let mut t = technique(&format!("AP-TX-LLM-JB-T{i}"));
            t.signal_value = *signal;
            t.detection_risk = 1.0 - *signal;
            techniques.push(t);
        }
        let admissible: Vec<&Technique> = techniques.iter().collect();

        let reports = scorer.sensitivity(&target(), &admissible);
        assert_eq!(reports.len(), 7);
        for report in reports {
            assert!((-1.0..=1.0).contains(&report.tau_down));
            assert!((-1.0..=1.0).contains(&report.tau_up));
        }
    }
}
