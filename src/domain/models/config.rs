//! Planner configuration.
//!
//! Every tunable the planning engine exposes, with the documented defaults.
//! Loaded hierarchically by `infrastructure::config::ConfigLoader`.

use serde::{Deserialize, Serialize};

/// Main configuration structure for redpilot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlannerConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub sampler: SamplerConfig,

    #[serde(default)]
    pub correlation: CorrelationConfig,

    #[serde(default)]
    pub phase: PhaseConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub meta: MetaConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Weights for the seven scoring dimensions.
///
/// Non-negative reals; the defaults sum to ≈ 1 but nothing requires that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoreWeights {
    #[serde(default = "default_w_compatibility")]
    pub compatibility: f64,
    #[serde(default = "default_w_access_fit")]
    pub access_fit: f64,
    #[serde(default = "default_w_goal_alignment")]
    pub goal_alignment: f64,
    #[serde(default = "default_w_defense_bypass")]
    pub defense_bypass: f64,
    #[serde(default = "default_w_signal_gain")]
    pub signal_gain: f64,
    #[serde(default = "default_w_cost_penalty")]
    pub cost_penalty: f64,
    #[serde(default = "default_w_detection_risk")]
    pub detection_risk: f64,
}

const fn default_w_compatibility() -> f64 {
    0.15
}
const fn default_w_access_fit() -> f64 {
    0.10
}
const fn default_w_goal_alignment() -> f64 {
    0.25
}
const fn default_w_defense_bypass() -> f64 {
    0.15
}
const fn default_w_signal_gain() -> f64 {
    0.20
}
const fn default_w_cost_penalty() -> f64 {
    0.05
}
const fn default_w_detection_risk() -> f64 {
    0.10
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            compatibility: default_w_compatibility(),
            access_fit: default_w_access_fit(),
            goal_alignment: default_w_goal_alignment(),
            defense_bypass: default_w_defense_bypass(),
            signal_gain: default_w_signal_gain(),
            cost_penalty: default_w_cost_penalty(),
            detection_risk: default_w_detection_risk(),
        }
    }
}

/// Functional form for partial defense bypass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefenseBypassMode {
    /// Fraction of active defenses the technique bypasses.
    #[default]
    Fraction,
    /// Full credit only when every active defense is bypassed.
    AllOrNothing,
}

/// Scoring configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoreWeights,

    #[serde(default)]
    pub defense_bypass_mode: DefenseBypassMode,
}

/// Thompson-sampling / ranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SamplerConfig {
    /// Blend weight on the normalized base score during probe phase.
    #[serde(default = "default_probe_score_weight")]
    pub probe_score_weight: f64,

    /// Blend weight on the normalized base score during exploit phase.
    #[serde(default = "default_exploit_score_weight")]
    pub exploit_score_weight: f64,

    /// Recommendations per batch.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

const fn default_probe_score_weight() -> f64 {
    0.6
}
const fn default_exploit_score_weight() -> f64 {
    0.3
}
const fn default_top_k() -> usize {
    12
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            probe_score_weight: default_probe_score_weight(),
            exploit_score_weight: default_exploit_score_weight(),
            top_k: default_top_k(),
        }
    }
}

/// Family-correlated posterior update configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CorrelationConfig {
    /// Evidence-transfer weight ρ applied to family siblings.
    #[serde(default = "default_rho")]
    pub rho: f64,
}

const fn default_rho() -> f64 {
    0.25
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self { rho: default_rho() }
    }
}

/// Probe → exploit phase-trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PhaseConfig {
    /// Distinct techniques observed before the probe-count trigger fires.
    #[serde(default = "default_probe_min_distinct")]
    pub probe_min_distinct: usize,

    /// Posterior mean a technique must exceed for the discovery trigger.
    #[serde(default = "default_exploit_threshold")]
    pub exploit_threshold: f64,

    /// Wilson lower bound the same technique must clear.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

const fn default_probe_min_distinct() -> usize {
    6
}
const fn default_exploit_threshold() -> f64 {
    0.5
}
const fn default_confidence_threshold() -> f64 {
    0.2
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            probe_min_distinct: default_probe_min_distinct(),
            exploit_threshold: default_exploit_threshold(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

/// Chain planner (beam search) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChainConfig {
    #[serde(default = "default_beam_width")]
    pub beam_width: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Family-correlation bonus κ applied to repeat-family steps.
    #[serde(default = "default_family_bonus")]
    pub family_bonus: f64,

    /// Chains emitted per request.
    #[serde(default = "default_chain_top_k")]
    pub top_k: usize,
}

const fn default_beam_width() -> usize {
    8
}
const fn default_max_depth() -> usize {
    5
}
const fn default_family_bonus() -> f64 {
    0.1
}
const fn default_chain_top_k() -> usize {
    5
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            beam_width: default_beam_width(),
            max_depth: default_max_depth(),
            family_bonus: default_family_bonus(),
            top_k: default_chain_top_k(),
        }
    }
}

/// Meta-learning warm-start configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetaConfig {
    /// Neighbor campaigns consulted on creation.
    #[serde(default = "default_neighbor_k")]
    pub neighbor_k: usize,

    /// Cap on the neighbor share of the blended prior.
    #[serde(default = "default_max_blend")]
    pub max_blend: f64,
}

const fn default_neighbor_k() -> usize {
    3
}
const fn default_max_blend() -> f64 {
    0.5
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            neighbor_k: default_neighbor_k(),
            max_blend: default_max_blend(),
        }
    }
}

/// Attempt budget configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetConfig {
    /// Default attempt budget when the target declares no `max_queries`.
    #[serde(default = "default_attempts")]
    pub default_attempts: u32,
}

const fn default_attempts() -> u32 {
    50
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_attempts: default_attempts(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    ".redpilot/redpilot.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = PlannerConfig::default();
        assert_eq!(config.sampler.probe_score_weight, 0.6);
        assert_eq!(config.sampler.exploit_score_weight, 0.3);
        assert_eq!(config.sampler.top_k, 12);
        assert_eq!(config.correlation.rho, 0.25);
        assert_eq!(config.phase.probe_min_distinct, 6);
        assert_eq!(config.phase.exploit_threshold, 0.5);
        assert_eq!(config.phase.confidence_threshold, 0.2);
        assert_eq!(config.chain.beam_width, 8);
        assert_eq!(config.chain.max_depth, 5);
        assert_eq!(config.chain.family_bonus, 0.1);
    }

    #[test]
    fn test_default_weights_are_normalized() {
        let w = ScoreWeights::default();
        let sum = w.compatibility
            + w.access_fit
            + w.goal_alignment
            + w.defense_bypass
            + w.signal_gain
            + w.cost_penalty
            + w.detection_risk;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: PlannerConfig =
            serde_yaml::from_str("sampler:\n  top_k: 5\n").unwrap();
        assert_eq!(config.sampler.top_k, 5);
        assert_eq!(config.sampler.probe_score_weight, 0.6);
        assert_eq!(config.correlation.rho, 0.25);
    }
}
