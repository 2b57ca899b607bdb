//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::PlannerConfig;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("scoring weight {0} must be non-negative, got {1}")]
    NegativeWeight(&'static str, f64),

    #[error("{0} must be within [0,1], got {1}")]
    OutOfUnitRange(&'static str, f64),

    #[error("{0} must be at least 1, got {1}")]
    BelowMinimum(&'static str, usize),

    #[error("correlation rho must be non-negative, got {0}")]
    NegativeRho(f64),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .redpilot/config.yaml (project config)
    /// 3. .redpilot/local.yaml (local overrides, optional)
    /// 4. Environment variables (`REDPILOT_*` prefix, highest priority)
    pub fn load() -> Result<PlannerConfig> {
        let config: PlannerConfig = Figment::new()
            .merge(Serialized::defaults(PlannerConfig::default()))
            .merge(Yaml::file(".redpilot/config.yaml"))
            .merge(Yaml::file(".redpilot/local.yaml"))
            .merge(Env::prefixed("REDPILOT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<PlannerConfig> {
        let config: PlannerConfig = Figment::new()
            .merge(Serialized::defaults(PlannerConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &PlannerConfig) -> Result<(), ConfigError> {
        if !matches!(
            config.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        if !matches!(config.logging.format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let weights = &config.scoring.weights;
        for (name, value) in [
            ("compatibility", weights.compatibility),
            ("access_fit", weights.access_fit),
            ("goal_alignment", weights.goal_alignment),
            ("defense_bypass", weights.defense_bypass),
            ("signal_gain", weights.signal_gain),
            ("cost_penalty", weights.cost_penalty),
            ("detection_risk", weights.detection_risk),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NegativeWeight(name, value));
            }
        }

        for (name, value) in [
            ("sampler.probe_score_weight", config.sampler.probe_score_weight),
            (
                "sampler.exploit_score_weight",
                config.sampler.exploit_score_weight,
            ),
            ("phase.exploit_threshold", config.phase.exploit_threshold),
            (
                "phase.confidence_threshold",
                config.phase.confidence_threshold,
            ),
            ("meta.max_blend", config.meta.max_blend),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange(name, value));
            }
        }

        if config.correlation.rho < 0.0 {
            return Err(ConfigError::NegativeRho(config.correlation.rho));
        }

        for (name, value) in [
            ("sampler.top_k", config.sampler.top_k),
            ("chain.beam_width", config.chain.beam_width),
            ("chain.max_depth", config.chain.max_depth),
            ("chain.top_k", config.chain.top_k),
            ("phase.probe_min_distinct", config.phase.probe_min_distinct),
        ] {
            if value < 1 {
                return Err(ConfigError::BelowMinimum(name, value));
            }
        }

        Ok(())
    }
}
