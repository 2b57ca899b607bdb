//! Beta posteriors over technique success probabilities.
//!
//! Each (campaign, technique) pair owns a Beta(α,β) posterior. Observations
//! increment α on success and β on failure (fractionally when a confidence
//! is supplied), and partially propagate to the technique's family via a
//! correlated update of weight ρ. Both parameters stay ≥ 1 by construction.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::catalog::TechniqueCatalog;

/// z for the 95% Wilson interval.
const WILSON_Z: f64 = 1.96;

/// Trajectory entries kept per posterior for reporting.
const TRAJECTORY_CAP: usize = 256;

/// One point in a posterior's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSnapshot {
    pub at: DateTime<Utc>,
    pub alpha: f64,
    pub beta: f64,
}

/// A Beta(α,β) belief about one technique's success probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaPosterior {
    pub alpha: f64,
    pub beta: f64,
    /// Parameters the posterior was materialized with.
    pub prior_alpha: f64,
    pub prior_beta: f64,
    /// Bounded history of (timestamp, α, β) used by reporting.
    #[serde(default)]
    pub trajectory: Vec<PosteriorSnapshot>,
}

impl BetaPosterior {
    /// Materialize from a prior, clamping both parameters to ≥ 1.
    pub fn from_prior(alpha: f64, beta: f64) -> Self {
        let alpha = alpha.max(1.0);
        let beta = beta.max(1.0);
        Self {
            alpha,
            beta,
            prior_alpha: alpha,
            prior_beta: beta,
            trajectory: Vec::new(),
        }
    }

    /// Posterior mean α/(α+β).
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Posterior variance αβ/((α+β)²(α+β+1)).
    pub fn variance(&self) -> f64 {
        let s = self.alpha + self.beta;
        (self.alpha * self.beta) / (s * s * (s + 1.0))
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Evidence mass accumulated since materialization.
    pub fn evidence_mass(&self) -> f64 {
        (self.alpha - self.prior_alpha) + (self.beta - self.prior_beta)
    }

    /// Wilson score interval at 95%, treating (α−1, β−1) as observed
    /// successes/failures. With no observations the interval is [0, 1].
    pub fn wilson_bounds(&self) -> (f64, f64) {
        let successes = self.alpha - 1.0;
        let failures = self.beta - 1.0;
        let n = successes + failures;
        if n <= f64::EPSILON {
            return (0.0, 1.0);
        }

        let z = WILSON_Z;
        let p_hat = successes / n;
        let z2 = z * z;
        let denominator = 1.0 + z2 / n;
        let center = p_hat + z2 / (2.0 * n);
        let margin = z * (p_hat * (1.0 - p_hat) / n + z2 / (4.0 * n * n)).sqrt();

        let lower = ((center - margin) / denominator).clamp(0.0, 1.0);
        let upper = ((center + margin) / denominator).clamp(0.0, 1.0);
        (lower, upper)
    }

    /// Draw one sample from the posterior.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        Beta::new(self.alpha, self.beta)
            .map(|dist| dist.sample(rng))
            .unwrap_or_else(|_| self.mean())
    }

    /// Apply an increment pair and record the trajectory point.
    pub fn record(&mut self, delta_alpha: f64, delta_beta: f64, at: DateTime<Utc>) {
        self.alpha += delta_alpha;
        self.beta += delta_beta;
        if self.trajectory.len() < TRAJECTORY_CAP {
            self.trajectory.push(PosteriorSnapshot {
                at,
                alpha: self.alpha,
                beta: self.beta,
            });
        }
    }
}

/// Per-campaign posterior store keyed by technique id.
///
/// Posteriors are materialized lazily on first sample or observation and
/// only ever mutated through their owning campaign. `BTreeMap` keeps
/// iteration order deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosteriorStore {
    entries: BTreeMap<String, BetaPosterior>,
}

impl PosteriorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, technique_id: &str) -> Option<&BetaPosterior> {
        self.entries.get(technique_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BetaPosterior)> {
        self.entries.iter()
    }

    /// Set a posterior's parameters directly.
    ///
    /// Used by meta-learning warm starts and test fixtures; parameters are
    /// clamped to ≥ 1 like every other construction path.
    pub fn seed_posterior(&mut self, technique_id: &str, alpha: f64, beta: f64) {
        self.entries
            .insert(technique_id.to_string(), BetaPosterior::from_prior(alpha, beta));
    }

    /// Draw a Thompson sample, materializing from the prior on first access.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        technique_id: &str,
        prior: (f64, f64),
        rng: &mut R,
    ) -> f64 {
        self.entry(technique_id, prior).sample(rng)
    }

    /// Posterior mean and 95% Wilson bounds, if materialized.
    pub fn moments(&self, technique_id: &str) -> Option<(f64, f64, f64)> {
        self.entries.get(technique_id).map(|posterior| {
            let (lower, upper) = posterior.wilson_bounds();
            (posterior.mean(), lower, upper)
        })
    }

    /// Record an observation and fan it out to the technique's family.
    ///
    /// The observed technique receives (c, 1−c) across (α, β); every other
    /// family member receives the same split scaled by `rho`. Techniques
    /// outside the family are untouched. `prior_for` resolves the prior
    /// used to materialize any posterior touched for the first time.
    pub fn observe<F>(
        &mut self,
        catalog: &TechniqueCatalog,
        prior_for: F,
        technique_id: &str,
        success: bool,
        confidence: Option<f64>,
        rho: f64,
        at: DateTime<Utc>,
    ) where
        F: Fn(&str) -> (f64, f64),
    {
        let credit = confidence.map_or(1.0, |c| c.clamp(0.0, 1.0));
        let (delta_alpha, delta_beta) = if success {
            (credit, 1.0 - credit)
        } else {
            (1.0 - credit, credit)
        };

        self.entry(technique_id, prior_for(technique_id))
            .record(delta_alpha, delta_beta, at);

        for sibling in catalog.family_siblings(technique_id) {
            self.entry(sibling, prior_for(sibling))
                .record(rho * delta_alpha, rho * delta_beta, at);
        }
    }

    /// Total evidence mass across all posteriors.
    pub fn total_evidence_mass(&self) -> f64 {
        self.entries.values().map(BetaPosterior::evidence_mass).sum()
    }

    fn entry(&mut self, technique_id: &str, prior: (f64, f64)) -> &mut BetaPosterior {
        self.entries
            .entry(technique_id.to_string())
            .or_insert_with(|| BetaPosterior::from_prior(prior.0, prior.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::technique::{
        AccessLevel, AttackDomain, Cost, Goal, StealthProfile, Surface, Technique,
    };
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn technique(id: &str, family: &str) -> Technique {
        Technique {
            id: id.to_string(),
            name: id.to_string(),
            domain: AttackDomain::Llm,
            surface: Surface::Model,
            target_kinds: vec![],
            min_access: AccessLevel::BlackBox,
            goals: vec![Goal::Jailbreak],
            cost: Cost::Low,
            stealth: StealthProfile::Moderate,
            bypasses_defenses: vec![],
            signal_value: 0.5,
            detection_risk: 0.5,
            tools: vec![],
            atlas_refs: vec![],
            compliance: Default::default(),
            family: family.to_string(),
            prerequisites: vec![],
            prior_key: None,
            narrative: None,
        }
    }

    fn family_catalog() -> TechniqueCatalog {
        TechniqueCatalog::try_new(vec![
            technique("AP-TX-LLM-JB-DAN", "jailbreak-persona"),
            technique("AP-TX-LLM-JB-GRANDMA", "jailbreak-persona"),
            technique("AP-TX-LLM-EXTRACT-SYSPROMPT", "extraction-direct"),
        ])
        .unwrap()
    }

    fn flat(_: &str) -> (f64, f64) {
        (1.0, 1.0)
    }

    #[test]
    fn test_mean_and_variance() {
        let posterior = BetaPosterior::from_prior(3.0, 1.0);
        assert!((posterior.mean() - 0.75).abs() < 1e-12);
        // αβ/((α+β)²(α+β+1)) = 3/(16·5)
        assert!((posterior.variance() - 3.0 / 80.0).abs() < 1e-12);
    }

    #[test]
    fn test_prior_clamped_to_one() {
        let posterior = BetaPosterior::from_prior(0.2, 0.0);
        assert_eq!(posterior.alpha, 1.0);
        assert_eq!(posterior.beta, 1.0);
    }

    #[test]
    fn test_wilson_bounds_no_observations() {
        let posterior = BetaPosterior::from_prior(1.0, 1.0);
        assert_eq!(posterior.wilson_bounds(), (0.0, 1.0));
    }

    #[test]
    fn test_wilson_bounds_single_success() {
        // α=2, β=1 → one success, zero failures
        let posterior = BetaPosterior::from_prior(1.0, 1.0);
        let mut posterior = posterior;
        posterior.record(1.0, 0.0, Utc::now());

        let (lower, upper) = posterior.wilson_bounds();
        assert!((lower - 0.2065).abs() < 1e-3);
        assert!((upper - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlated_update_hits_family_only() {
        let catalog = family_catalog();
        let mut store = PosteriorStore::new();

        store.observe(
            &catalog,
            flat,
            "AP-TX-LLM-JB-DAN",
            true,
            None,
            0.25,
            Utc::now(),
        );

        let observed = store.get("AP-TX-LLM-JB-DAN").unwrap();
        assert!((observed.alpha - 2.0).abs() < 1e-12);
        assert!((observed.beta - 1.0).abs() < 1e-12);

        let sibling = store.get("AP-TX-LLM-JB-GRANDMA").unwrap();
        assert!((sibling.alpha - 1.25).abs() < 1e-12);
        assert!((sibling.beta - 1.0).abs() < 1e-12);

        assert!(store.get("AP-TX-LLM-EXTRACT-SYSPROMPT").is_none());
    }

    #[test]
    fn test_fractional_credit_split() {
        let catalog = family_catalog();
        let mut store = PosteriorStore::new();

        store.observe(
            &catalog,
            flat,
            "AP-TX-LLM-JB-DAN",
            true,
            Some(0.8),
            0.25,
            Utc::now(),
        );

        let observed = store.get("AP-TX-LLM-JB-DAN").unwrap();
        assert!((observed.alpha - 1.8).abs() < 1e-12);
        assert!((observed.beta - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_sampling_is_deterministic_for_fixed_seed() {
        let posterior = BetaPosterior::from_prior(4.0, 2.0);
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        assert_eq!(posterior.sample(&mut rng_a), posterior.sample(&mut rng_b));
    }

    #[test]
    fn test_seed_posterior_overrides() {
        let mut store = PosteriorStore::new();
        store.seed_posterior("AP-TX-LLM-JB-DAN", 18.0, 7.0);
        let (mean, _, _) = store.moments("AP-TX-LLM-JB-DAN").unwrap();
        assert!((mean - 0.72).abs() < 1e-12);
    }

    proptest! {
        /// Invariant 1: α,β never drop below 1 under any observation mix.
        #[test]
        fn prop_parameters_stay_at_least_one(
            observations in prop::collection::vec((any::<bool>(), 0.0f64..=1.0), 0..40)
        ) {
            let catalog = family_catalog();
            let mut store = PosteriorStore::new();

            for (success, confidence) in observations {
                store.observe(
                    &catalog,
                    flat,
                    "AP-TX-LLM-JB-DAN",
                    success,
                    Some(confidence),
                    0.25,
                    Utc::now(),
                );
            }

            for (_, posterior) in store.iter() {
                prop_assert!(posterior.alpha >= 1.0);
                prop_assert!(posterior.beta >= 1.0);
            }
        }

        /// Invariant 2: correlated updates carry exactly the intended
        /// evidence mass: attempts · (1 + ρ·(family_size − 1)).
        #[test]
        fn prop_evidence_mass_accounts_for_fanout(
            attempts in 1usize..30,
            rho in 0.0f64..=1.0,
        ) {
            let catalog = family_catalog();
            let mut store = PosteriorStore::new();

            for i in 0..attempts {
                store.observe(
                    &catalog,
                    flat,
                    "AP-TX-LLM-JB-DAN",
                    i % 2 == 0,
                    None,
                    rho,
                    Utc::now(),
                );
            }

            let family_size = 2.0; // jailbreak-persona members
            let expected = attempts as f64 * (1.0 + rho * (family_size - 1.0));
            prop_assert!((store.total_evidence_mass() - expected).abs() < 1e-9);
        }
    }
}
