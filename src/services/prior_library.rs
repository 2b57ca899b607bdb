//! Benchmark-calibrated Beta priors.
//!
//! Each entry turns a published attack-success-rate point (mean μ,
//! effective sample size n) into Beta(μ·n, (1−μ)·n), clamped so both
//! parameters stay ≥ 1. Techniques without a prior key fall back to the
//! flat Beta(1,1).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::models::technique::Technique;
use crate::domain::models::TechniqueCatalog;

/// A Beta(α₀, β₀) prior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaPrior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPrior {
    /// Flat Beta(1,1).
    pub const FLAT: Self = Self {
        alpha: 1.0,
        beta: 1.0,
    };

    /// From a benchmark point: mean μ with effective sample size n.
    pub fn from_point(mu: f64, n: f64) -> Self {
        Self {
            alpha: (mu * n).max(1.0),
            beta: ((1.0 - mu) * n).max(1.0),
        }
    }

    pub fn mean(self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn std_dev(self) -> f64 {
        let s = self.alpha + self.beta;
        ((self.alpha * self.beta) / (s * s * (s + 1.0))).sqrt()
    }

    pub fn as_pair(self) -> (f64, f64) {
        (self.alpha, self.beta)
    }
}

/// Prior table keyed by benchmark identifier.
#[derive(Debug, Clone, Default)]
pub struct PriorLibrary {
    table: BTreeMap<String, BetaPrior>,
}

impl PriorLibrary {
    pub fn new(table: BTreeMap<String, BetaPrior>) -> Self {
        Self { table }
    }

    /// Builtin table derived from published benchmark ASR points.
    ///
    /// Sources are coarse community benchmarks (jailbreak leaderboards,
    /// injection test suites, extraction studies); the effective sample
    /// sizes are kept modest so observed evidence overtakes the prior
    /// within a handful of attempts.
    pub fn builtin() -> Self {
        let points: &[(&str, f64, f64)] = &[
            ("benchmark/dan", 0.35, 40.0),
            ("benchmark/gcg-suffix", 0.55, 30.0),
            ("benchmark/pair-iterative", 0.48, 25.0),
            ("benchmark/crescendo-multiturn", 0.62, 25.0),
            ("benchmark/encoding-evasion", 0.40, 30.0),
            ("benchmark/persona-roleplay", 0.38, 35.0),
            ("benchmark/prompt-injection-direct", 0.58, 35.0),
            ("benchmark/prompt-injection-indirect", 0.45, 20.0),
            ("benchmark/sysprompt-extraction", 0.68, 25.0),
            ("benchmark/training-data-extraction", 0.12, 30.0),
            ("benchmark/pii-extraction", 0.25, 25.0),
            ("benchmark/membership-inference", 0.30, 20.0),
            ("benchmark/model-extraction", 0.20, 15.0),
            ("benchmark/adversarial-evasion", 0.65, 30.0),
            ("benchmark/data-poisoning", 0.35, 15.0),
            ("benchmark/agent-tool-abuse", 0.50, 20.0),
            ("benchmark/agent-goal-hijack", 0.44, 18.0),
            ("benchmark/retrieval-poisoning", 0.42, 18.0),
        ];

        let table = points
            .iter()
            .map(|&(key, mu, n)| (key.to_string(), BetaPrior::from_point(mu, n)))
            .collect();
        Self { table }
    }

    pub fn get(&self, key: &str) -> Option<BetaPrior> {
        self.table.get(key).copied()
    }

    /// Prior for a technique: its keyed entry, else flat.
    pub fn prior_for(&self, technique: &Technique) -> BetaPrior {
        technique
            .prior_key
            .as_deref()
            .and_then(|key| self.get(key))
            .unwrap_or(BetaPrior::FLAT)
    }

    /// Prior for a technique id resolved through a catalog.
    pub fn prior_for_id(&self, catalog: &TechniqueCatalog, technique_id: &str) -> BetaPrior {
        catalog
            .by_id(technique_id)
            .map_or(BetaPrior::FLAT, |t| self.prior_for(t))
    }

    /// Closure resolving `(α₀, β₀)` by technique id, for the posterior
    /// store's lazy materialization.
    pub fn resolver<'a>(
        &'a self,
        catalog: &'a TechniqueCatalog,
    ) -> impl Fn(&str) -> (f64, f64) + 'a {
        move |id| self.prior_for_id(catalog, id).as_pair()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
