//! Campaign lifecycle orchestration.
//!
//! create → recommend → observe → update → terminate, with persistence at
//! every transition. Observations are atomic: all mutation happens on a
//! loaded copy and the repository write must succeed before the new state
//! exists anywhere. Operations on one campaign are expected to be
//! serialized by the caller; campaigns never share mutable state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{PlannerError, PlannerResult};
use crate::domain::models::campaign::{AttemptRecord, Campaign, Phase};
use crate::domain::models::config::PlannerConfig;
use crate::domain::models::plan::{PlanReason, PlanResponse, RecommendationBatch};
use crate::domain::models::target::TargetProfile;
use crate::domain::models::TechniqueCatalog;
use crate::domain::ports::{CampaignRepository, MetaLearningStore};

use super::import::{self, ImportWarningRecord, MappedObservation};
use super::meta_learning::{snapshot_campaign, MetaLearner};
use super::prior_library::PriorLibrary;
use super::sampler;

/// Result of a bulk tool-result import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub applied: Vec<MappedObservation>,
    pub warnings: Vec<ImportWarningRecord>,
    pub phase_after: Phase,
    pub budget_remaining: u32,
}

/// Result of replaying a campaign's recorded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub campaign_id: Uuid,
    pub batches_total: usize,
    pub batches_matched: usize,
    pub posteriors_match: bool,
}

impl ReplayReport {
    /// Whether the replay reproduced the recorded history exactly.
    pub fn is_faithful(&self) -> bool {
        self.batches_matched == self.batches_total && self.posteriors_match
    }
}

/// Repository-backed campaign state machine.
pub struct CampaignManager {
    catalog: Arc<TechniqueCatalog>,
    priors: Arc<PriorLibrary>,
    config: PlannerConfig,
    repo: Arc<dyn CampaignRepository>,
    meta: Arc<dyn MetaLearningStore>,
    meta_learner: MetaLearner,
}

impl CampaignManager {
    pub fn new(
        catalog: Arc<TechniqueCatalog>,
        priors: Arc<PriorLibrary>,
        config: PlannerConfig,
        repo: Arc<dyn CampaignRepository>,
        meta: Arc<dyn MetaLearningStore>,
    ) -> Self {
        let meta_learner = MetaLearner::new(config.meta.clone());
        Self {
            catalog,
            priors,
            config,
            repo,
            meta,
            meta_learner,
        }
    }

    pub fn catalog(&self) -> &TechniqueCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// One-shot plan for a target without campaign state: fresh posteriors
    /// straight from the priors. Deterministic for a given seed.
    pub fn plan_for_target(&self, target: &TargetProfile, seed: u64) -> PlanResponse {
        let mut scratch = Campaign::new(
            target.clone(),
            seed,
            self.catalog.version_hash(),
            1,
        );
        let batch = sampler::recommend(&self.catalog, &self.priors, &self.config, &mut scratch);

        let reason = batch
            .entries
            .is_empty()
            .then_some(PlanReason::NoAdmissibleTechniques);
        PlanResponse {
            target_name: target.name.clone(),
            entries: batch.entries,
            reason,
            generated_at: batch.generated_at,
        }
    }

    /// Create a campaign: snapshot the target, warm-start posteriors from
    /// similar completed campaigns, persist, return.
    pub async fn create(
        &self,
        target: TargetProfile,
        seed: Option<u64>,
    ) -> PlannerResult<Campaign> {
        let seed = seed.unwrap_or_else(entropy_seed);
        let budget = target
            .max_queries
            .unwrap_or(self.config.budget.default_attempts);

        let mut campaign = Campaign::new(target, seed, self.catalog.version_hash(), budget);

        let snapshots = self.meta.all().await?;
        self.meta_learner
            .warm_start(&mut campaign, &self.catalog, &self.priors, &snapshots);

        self.repo.insert(&campaign).await?;
        tracing::info!(
            campaign_id = %campaign.id,
            target = %campaign.target.name,
            seed = campaign.seed,
            budget,
            "campaign created"
        );
        Ok(campaign)
    }

    /// Generate, log, and persist the next recommendation batch.
    pub async fn recommend(&self, id: Uuid) -> PlannerResult<RecommendationBatch> {
        let mut campaign = self.load(id).await?;
        ensure_active(&campaign)?;

        let batch = sampler::recommend(&self.catalog, &self.priors, &self.config, &mut campaign);
        campaign.recommendations.push(batch.clone());
        self.repo.update(&campaign).await?;

        tracing::debug!(
            campaign_id = %id,
            batch = batch.sequence,
            entries = batch.entries.len(),
            "recommendation batch generated"
        );
        Ok(batch)
    }

    /// Record one attempt result and update posteriors + phase.
    pub async fn observe(
        &self,
        id: Uuid,
        technique_id: &str,
        success: bool,
        confidence: Option<f64>,
    ) -> PlannerResult<Campaign> {
        let mut campaign = self.load(id).await?;
        ensure_active(&campaign)?;

        self.apply_observation(&mut campaign, technique_id, success, confidence)?;
        self.repo.update(&campaign).await?;
        self.finalize_if_terminated(&campaign).await?;

        Ok(campaign)
    }

    /// Bulk-observe external tool results. Unmapped ids become warnings;
    /// results arriving after the budget ran out are reported, not applied.
    pub async fn import_results(&self, id: Uuid, payload: &str) -> PlannerResult<ImportOutcome> {
        let mut campaign = self.load(id).await?;
        ensure_active(&campaign)?;

        let records = import::parse_payload(payload)
            .map_err(crate::domain::errors::PersistenceError::from)?;
        let (mapped, mut warnings) = import::map_results(records);

        let mut applied = Vec::new();
        for observation in mapped {
            if campaign.is_terminated() {
                warnings.push(ImportWarningRecord {
                    source_id: observation.source_id.clone(),
                    message: "campaign terminated before this result; not applied".to_string(),
                });
                continue;
            }
            self.apply_observation(
                &mut campaign,
                &observation.technique_id,
                observation.success,
                observation.confidence,
            )?;
            applied.push(observation);
        }

        self.repo.update(&campaign).await?;
        self.finalize_if_terminated(&campaign).await?;

        tracing::info!(
            campaign_id = %id,
            applied = applied.len(),
            warnings = warnings.len(),
            "tool results imported"
        );
        Ok(ImportOutcome {
            applied,
            warnings,
            phase_after: campaign.phase,
            budget_remaining: campaign.budget_remaining,
        })
    }

    /// Operator-requested advance to the exploit phase (trigger c).
    pub async fn advance(&self, id: Uuid) -> PlannerResult<Campaign> {
        let mut campaign = self.load(id).await?;
        ensure_active(&campaign)?;
        campaign.advance_phase(Phase::Exploit)?;
        self.repo.update(&campaign).await?;
        Ok(campaign)
    }

    /// Explicit termination. The campaign stays readable forever.
    pub async fn terminate(&self, id: Uuid) -> PlannerResult<Campaign> {
        let mut campaign = self.load(id).await?;
        ensure_active(&campaign)?;
        campaign.advance_phase(Phase::Terminated)?;
        self.repo.update(&campaign).await?;
        self.finalize_if_terminated(&campaign).await?;
        Ok(campaign)
    }

    pub async fn get(&self, id: Uuid) -> PlannerResult<Campaign> {
        self.load(id).await
    }

    pub async fn list(&self) -> PlannerResult<Vec<crate::domain::ports::CampaignSummary>> {
        Ok(self.repo.list().await?)
    }

    /// Re-execute the recorded history against a fresh posterior store
    /// with the original seed and compare every recommendation batch.
    pub async fn replay(&self, id: Uuid) -> PlannerResult<ReplayReport> {
        let original = self.load(id).await?;
        let mut shell = original.replay_shell();

        let mut applied = 0usize;
        let mut matched = 0usize;

        for recorded in &original.recommendations {
            while applied < recorded.after_attempts as usize {
                let attempt = &original.attempts[applied];
                self.apply_observation(
                    &mut shell,
                    &attempt.technique_id,
                    attempt.success,
                    attempt.confidence,
                )?;
                applied += 1;
            }

            let regenerated =
                sampler::recommend(&self.catalog, &self.priors, &self.config, &mut shell);
            if recorded.same_ranking(&regenerated) {
                matched += 1;
            }
            shell.recommendations.push(regenerated);
        }

        while applied < original.attempts.len() {
            let attempt = &original.attempts[applied];
            self.apply_observation(
                &mut shell,
                &attempt.technique_id,
                attempt.success,
                attempt.confidence,
            )?;
            applied += 1;
        }

        let posteriors_match = posterior_stores_equal(&original, &shell);
        Ok(ReplayReport {
            campaign_id: id,
            batches_total: original.recommendations.len(),
            batches_matched: matched,
            posteriors_match,
        })
    }

    async fn load(&self, id: Uuid) -> PlannerResult<Campaign> {
        self.repo
            .get(id)
            .await?
            .ok_or(PlannerError::CampaignNotFound(id))
    }

    /// Apply one observation to an in-memory campaign: posterior update
    /// with family fanout, attempt log, budget decrement, phase triggers.
    fn apply_observation(
        &self,
        campaign: &mut Campaign,
        technique_id: &str,
        success: bool,
        confidence: Option<f64>,
    ) -> PlannerResult<()> {
        if self.catalog.by_id(technique_id).is_none() {
            return Err(PlannerError::UnknownTechnique(technique_id.to_string()));
        }

        let now = Utc::now();
        let resolver = self.priors.resolver(&self.catalog);
        campaign.posteriors.observe(
            &self.catalog,
            resolver,
            technique_id,
            success,
            confidence,
            self.config.correlation.rho,
            now,
        );

        campaign.attempts.push(AttemptRecord {
            sequence: campaign.next_attempt_sequence(),
            technique_id: technique_id.to_string(),
            success,
            confidence,
            observed_at: now,
        });

        campaign.budget_remaining = campaign.budget_remaining.saturating_sub(1);
        if campaign.budget_remaining == 0 {
            campaign.advance_phase(Phase::Terminated)?;
            tracing::info!(campaign_id = %campaign.id, "attempt budget exhausted; campaign terminated");
            return Ok(());
        }

        if campaign.phase == Phase::Probe && self.probe_exit_triggered(campaign) {
            campaign.advance_phase(Phase::Exploit)?;
            tracing::info!(campaign_id = %campaign.id, "phase trigger satisfied; entering exploit");
        }

        Ok(())
    }

    /// Trigger (a): enough distinct techniques probed. Trigger (b): some
    /// posterior clears the exploit threshold with Wilson confidence.
    fn probe_exit_triggered(&self, campaign: &Campaign) -> bool {
        if campaign.distinct_observed().len() >= self.config.phase.probe_min_distinct {
            return true;
        }

        campaign.posteriors.iter().any(|(_, posterior)| {
            let (lower, _) = posterior.wilson_bounds();
            posterior.mean() > self.config.phase.exploit_threshold
                && lower > self.config.phase.confidence_threshold
        })
    }

    async fn finalize_if_terminated(&self, campaign: &Campaign) -> PlannerResult<()> {
        if campaign.is_terminated() {
            self.meta.record(&snapshot_campaign(campaign)).await?;
        }
        Ok(())
    }
}

fn ensure_active(campaign: &Campaign) -> PlannerResult<()> {
    if campaign.is_terminated() {
        return Err(PlannerError::CampaignTerminated(campaign.id));
    }
    Ok(())
}

/// (α, β) equality across both stores within float tolerance.
fn posterior_stores_equal(a: &Campaign, b: &Campaign) -> bool {
    if a.posteriors.len() != b.posteriors.len() {
        return false;
    }
    a.posteriors.iter().all(|(id, posterior)| {
        b.posteriors.get(id).is_some_and(|other| {
            (posterior.alpha - other.alpha).abs() < 1e-9
                && (posterior.beta - other.beta).abs() < 1e-9
        })
    })
}

/// Seed for campaigns that did not pin one: drawn from UUID entropy so it
/// is recorded, not ambient.
fn entropy_seed() -> u64 {
    let id = Uuid::new_v4();
    u64::from_le_bytes(id.as_bytes()[..8].try_into().expect("uuid has 16 bytes"))
}
