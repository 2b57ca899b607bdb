//! Campaign state.
//!
//! A campaign snapshots a target, owns its posterior store and attempt log,
//! and progresses monotonically probe → exploit → terminated. All
//! randomness downstream flows from the campaign's recorded seed, and the
//! audit token ties the campaign to the exact (target, catalog, seed)
//! triple it was created from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::super::errors::{PersistenceError, PlannerError};
use super::plan::RecommendationBatch;
use super::posterior::PosteriorStore;
use super::target::TargetProfile;

/// Campaign document schema version (persistence form).
pub const CAMPAIGN_SCHEMA_VERSION: &str = "1.0";

/// Campaign phase. Transitions are monotone; terminated is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Probe,
    Exploit,
    Terminated,
}

impl Phase {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Probe, Self::Exploit)
                | (Self::Probe, Self::Terminated)
                | (Self::Exploit, Self::Terminated)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe => write!(f, "probe"),
            Self::Exploit => write!(f, "exploit"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "probe" => Ok(Self::Probe),
            "exploit" => Ok(Self::Exploit),
            "terminated" => Ok(Self::Terminated),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

/// One recorded attempt result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Position in the campaign's total observation order.
    pub sequence: u32,
    pub technique_id: String,
    pub success: bool,
    /// Partial-credit confidence in [0,1], if the tool supplied one.
    #[serde(default)]
    pub confidence: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

/// A campaign: target snapshot, phase, budget, attempt log, posteriors,
/// recommendation log, seed, audit token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Snapshot by value; never mutated after creation.
    pub target: TargetProfile,
    pub phase: Phase,
    pub budget_remaining: u32,
    pub attempts: Vec<AttemptRecord>,
    pub posteriors: PosteriorStore,
    pub recommendations: Vec<RecommendationBatch>,
    /// Seed for the campaign's sampler. Fixed at creation.
    pub seed: u64,
    /// Version hash of the catalog the campaign was created against.
    pub catalog_version: String,
    /// hash(target ∥ catalog version ∥ seed); reproducibility proof.
    pub audit_token: String,
}

impl Campaign {
    pub fn new(target: TargetProfile, seed: u64, catalog_version: &str, budget: u32) -> Self {
        let audit_token = audit_token(&target, catalog_version, seed);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            target,
            phase: Phase::Probe,
            budget_remaining: budget,
            attempts: Vec::new(),
            posteriors: PosteriorStore::new(),
            recommendations: Vec::new(),
            seed,
            catalog_version: catalog_version.to_string(),
            audit_token,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    /// Distinct technique ids with at least one recorded attempt.
    pub fn distinct_observed(&self) -> BTreeSet<&str> {
        self.attempts
            .iter()
            .map(|a| a.technique_id.as_str())
            .collect()
    }

    /// Sequence number the next attempt will receive.
    pub fn next_attempt_sequence(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }

    /// Sequence number the next recommendation batch will receive.
    pub fn next_batch_sequence(&self) -> u32 {
        u32::try_from(self.recommendations.len()).unwrap_or(u32::MAX)
    }

    /// The most recent cached recommendation batch.
    pub fn last_recommendation(&self) -> Option<&RecommendationBatch> {
        self.recommendations.last()
    }

    /// Advance the phase, enforcing monotonicity.
    pub fn advance_phase(&mut self, next: Phase) -> Result<(), PlannerError> {
        if !self.phase.can_transition_to(next) {
            return Err(PlannerError::InvalidPhaseTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// A fresh campaign with the same identity, target, seed and budget
    /// but no recorded history. Used by replay.
    pub fn replay_shell(&self) -> Self {
        let budget = self.budget_remaining
            + u32::try_from(self.attempts.len()).unwrap_or(u32::MAX);
        Self {
            id: self.id,
            created_at: self.created_at,
            target: self.target.clone(),
            phase: Phase::Probe,
            budget_remaining: budget,
            attempts: Vec::new(),
            posteriors: PosteriorStore::new(),
            recommendations: Vec::new(),
            seed: self.seed,
            catalog_version: self.catalog_version.clone(),
            audit_token: self.audit_token.clone(),
        }
    }
}

/// Opaque hash identifying the exact inputs to a campaign.
pub fn audit_token(target: &TargetProfile, catalog_version: &str, seed: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(target).unwrap_or_default());
    hasher.update(catalog_version.as_bytes());
    hasher.update(seed.to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Self-describing persistence form of a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignDocument {
    pub schema_version: String,
    pub campaign: Campaign,
}

impl CampaignDocument {
    pub fn wrap(campaign: Campaign) -> Self {
        Self {
            schema_version: CAMPAIGN_SCHEMA_VERSION.to_string(),
            campaign,
        }
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a campaign document, checking schema and catalog versions.
    pub fn from_json(
        text: &str,
        runtime_catalog_version: &str,
    ) -> Result<Campaign, PersistenceError> {
        let document: Self = serde_json::from_str(text)?;
        if document.schema_version != CAMPAIGN_SCHEMA_VERSION {
            return Err(PersistenceError::SchemaVersionMismatch {
                expected: CAMPAIGN_SCHEMA_VERSION.to_string(),
                found: document.schema_version,
            });
        }
        if document.campaign.catalog_version != runtime_catalog_version {
            return Err(PersistenceError::CatalogVersionMismatch {
                expected: runtime_catalog_version.to_string(),
                found: document.campaign.catalog_version,
            });
        }
        Ok(document.campaign)
    }
}
