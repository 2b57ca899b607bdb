//! Cross-campaign posterior warm starting.
//!
//! Completed campaigns leave a posterior snapshot keyed by a
//! target-attribute fingerprint. A new campaign blends the library prior
//! with the posteriors of its K nearest prior campaigns (weighted Jaccard
//! similarity over kind/access/goals/defenses), with the neighbor share
//! capped so the library prior is never fully overwhelmed.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::models::campaign::Campaign;
use crate::domain::models::config::MetaConfig;
use crate::domain::models::target::TargetProfile;
use crate::domain::models::TechniqueCatalog;
use crate::domain::ports::MetaSnapshot;

use super::prior_library::PriorLibrary;

/// Feature tokens the similarity metric runs over.
pub fn feature_set(target: &TargetProfile) -> BTreeSet<String> {
    let mut features = BTreeSet::new();
    features.insert(format!("kind:{}", target.kind));
    features.insert(format!("access:{}", target.access));
    for goal in &target.goals {
        features.insert(format!("goal:{goal}"));
    }
    for flag in target.active_defenses() {
        features.insert(format!("defense:{flag}"));
    }
    features
}

/// Stable fingerprint string for persistence keying.
pub fn fingerprint(target: &TargetProfile) -> String {
    feature_set(target).into_iter().collect::<Vec<_>>().join("|")
}

/// Class weight of a feature token: kind 0.3, access 0.2, goals 0.3,
/// defenses 0.2.
fn feature_weight(token: &str) -> f64 {
    if token.starts_with("kind:") {
        0.3
    } else if token.starts_with("access:") {
        0.2
    } else if token.starts_with("goal:") {
        0.3
    } else {
        0.2
    }
}

/// Weighted Jaccard distance in [0,1] between two feature sets.
pub fn weighted_jaccard_distance(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union_weight: f64 = a.union(b).map(|t| feature_weight(t)).sum();
    if union_weight <= f64::EPSILON {
        return 0.0;
    }
    let intersection_weight: f64 = a.intersection(b).map(|t| feature_weight(t)).sum();
    1.0 - intersection_weight / union_weight
}

/// Warm-starting service.
#[derive(Debug, Clone, Default)]
pub struct MetaLearner {
    config: MetaConfig,
}

impl MetaLearner {
    pub fn new(config: MetaConfig) -> Self {
        Self { config }
    }

    /// K nearest snapshots with their similarity (1 − distance), most
    /// similar first. Ties break by campaign id for determinism.
    pub fn nearest<'a>(
        &self,
        snapshots: &'a [MetaSnapshot],
        target: &TargetProfile,
    ) -> Vec<(&'a MetaSnapshot, f64)> {
        let features = feature_set(target);
        let mut ranked: Vec<(&MetaSnapshot, f64)> = snapshots
            .iter()
            .map(|snapshot| {
                let similarity = 1.0 - weighted_jaccard_distance(&features, &snapshot.features);
                (snapshot, similarity)
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.campaign_id.cmp(&b.0.campaign_id))
        });
        ranked.truncate(self.config.neighbor_k);
        ranked
    }

    /// Seed a new campaign's posteriors from its nearest neighbors.
    ///
    /// Per technique: `(1−w)·library_prior + w·Σᵢ wᵢ·neighborᵢ`, where wᵢ
    /// is proportional to similarity and w = min(max_blend, mean
    /// similarity). Neighbors lacking a technique contribute the library
    /// prior, keeping the blend neutral where they are silent.
    pub fn warm_start(
        &self,
        campaign: &mut Campaign,
        catalog: &TechniqueCatalog,
        priors: &PriorLibrary,
        snapshots: &[MetaSnapshot],
    ) {
        let neighbors = self.nearest(snapshots, &campaign.target);
        if neighbors.is_empty() {
            return;
        }

        let similarity_sum: f64 = neighbors.iter().map(|(_, s)| s).sum();
        if similarity_sum <= f64::EPSILON {
            return;
        }

        #[allow(clippy::cast_precision_loss)]
        let mean_similarity = similarity_sum / neighbors.len() as f64;
        let blend = mean_similarity.min(self.config.max_blend);

        let mut technique_ids: BTreeSet<&str> = BTreeSet::new();
        for (snapshot, _) in &neighbors {
            technique_ids.extend(snapshot.posteriors.keys().map(String::as_str));
        }

        for technique_id in technique_ids {
            let prior = priors.prior_for_id(catalog, technique_id);

            let mut neighbor_alpha = 0.0;
            let mut neighbor_beta = 0.0;
            for (snapshot, similarity) in &neighbors {
                let weight = similarity / similarity_sum;
                let (alpha, beta) = snapshot
                    .posteriors
                    .get(technique_id)
                    .copied()
                    .unwrap_or((prior.alpha, prior.beta));
                neighbor_alpha += weight * alpha;
                neighbor_beta += weight * beta;
            }

            let alpha = (1.0 - blend) * prior.alpha + blend * neighbor_alpha;
            let beta = (1.0 - blend) * prior.beta + blend * neighbor_beta;
            campaign.posteriors.seed_posterior(technique_id, alpha, beta);
        }

        tracing::debug!(
            campaign_id = %campaign.id,
            neighbors = neighbors.len(),
            blend,
            "warm-started posteriors from prior campaigns"
        );
    }
}

/// Snapshot a terminated campaign for the meta-learning store.
pub fn snapshot_campaign(campaign: &Campaign) -> MetaSnapshot {
    let posteriors: BTreeMap<String, (f64, f64)> = campaign
        .posteriors
        .iter()
        .map(|(id, posterior)| (id.clone(), (posterior.alpha, posterior.beta)))
        .collect();

    MetaSnapshot {
        campaign_id: campaign.id,
        fingerprint: fingerprint(&campaign.target),
        features: feature_set(&campaign.target),
        posteriors,
        completed_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::technique::{AccessLevel, Goal, TargetKind};
    use chrono::Utc;
    use uuid::Uuid;

    fn target() -> TargetProfile {
        TargetProfile::new(
            "t",
            TargetKind::Chatbot,
            AccessLevel::BlackBox,
            [Goal::Jailbreak],
        )
        .with_defense("has_moderation", true)
    }

    fn snapshot(target: &TargetProfile, posteriors: &[(&str, f64, f64)]) -> MetaSnapshot {
        MetaSnapshot {
            campaign_id: Uuid::new_v4(),
            fingerprint: fingerprint(target),
            features: feature_set(target),
            posteriors: posteriors
                .iter()
                .map(|&(id, a, b)| (id.to_string(), (a, b)))
                .collect(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_identical_targets_have_zero_distance() {
        let a = feature_set(&target());
        let b = feature_set(&target());
        assert!(weighted_jaccard_distance(&a, &b).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_targets_have_unit_distance() {
        let a = feature_set(&target());
        let other = TargetProfile::new(
            "o",
            TargetKind::Classifier,
            AccessLevel::WhiteBox,
            [Goal::Evasion],
        );
        let b = feature_set(&other);
        assert!((weighted_jaccard_distance(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_goal_overlap_reduces_distance() {
        let a = feature_set(&target());
        let mut similar = target();
        similar.goals.insert(Goal::Extraction);
        let b = feature_set(&similar);

        let distance = weighted_jaccard_distance(&a, &b);
        assert!(distance > 0.0 && distance < 0.5);
    }

    #[test]
    fn test_nearest_is_capped_at_k() {
        let learner = MetaLearner::new(MetaConfig {
            neighbor_k: 2,
            ..MetaConfig::default()
        });

        let snapshots: Vec<MetaSnapshot> =
            (0..5).map(|_| snapshot(&target(), &[])).collect();
        assert_eq!(learner.nearest(&snapshots, &target()).len(), 2);
    }

    #[test]
    fn test_warm_start_blends_toward_neighbor_capped() {
        use crate::domain::models::campaign::Campaign;

        let learner = MetaLearner::default();
        let catalog = TechniqueCatalog::try_new(vec![]).unwrap();
        let priors = PriorLibrary::default();

        // One identical neighbor: similarity 1.0, blend capped at 0.5.
        let neighbor = snapshot(&target(), &[("AP-TX-LLM-JB-DAN", 9.0, 3.0)]);
        let mut campaign = Campaign::new(target(), 1, "cat", 10);

        learner.warm_start(&mut campaign, &catalog, &priors, &[neighbor]);

        let posterior = campaign.posteriors.get("AP-TX-LLM-JB-DAN").unwrap();
        // (1−0.5)·1 + 0.5·9 = 5 and (1−0.5)·1 + 0.5·3 = 2
        assert!((posterior.alpha - 5.0).abs() < 1e-9);
        assert!((posterior.beta - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_warm_start_without_snapshots_is_noop() {
        use crate::domain::models::campaign::Campaign;

        let learner = MetaLearner::default();
        let catalog = TechniqueCatalog::try_new(vec![]).unwrap();
        let priors = PriorLibrary::default();
        let mut campaign = Campaign::new(target(), 1, "cat", 10);

        learner.warm_start(&mut campaign, &catalog, &priors, &[]);
        assert!(campaign.posteriors.is_empty());
    }
}
