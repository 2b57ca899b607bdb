//! Repository interfaces for persistence.
//!
//! The planning core is pure; these async traits are the only suspension
//! points. In-memory implementations back unit tests and library embedders
//! that do not want a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

use super::errors::PersistenceError;
use super::models::campaign::{Campaign, Phase};

/// Lightweight campaign listing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub id: Uuid,
    pub target_name: String,
    pub phase: Phase,
    pub budget_remaining: u32,
    pub attempts: usize,
}

/// Campaign persistence operations.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn insert(&self, campaign: &Campaign) -> Result<(), PersistenceError>;

    async fn update(&self, campaign: &Campaign) -> Result<(), PersistenceError>;

    async fn get(&self, id: Uuid) -> Result<Option<Campaign>, PersistenceError>;

    async fn list(&self) -> Result<Vec<CampaignSummary>, PersistenceError>;
}

/// Final posterior snapshot of a completed campaign, keyed for similarity
/// lookup on later campaign creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaSnapshot {
    pub campaign_id: Uuid,
    pub fingerprint: String,
    /// Feature tokens the weighted Jaccard distance runs over.
    pub features: BTreeSet<String>,
    /// technique id → (α, β) at campaign termination.
    pub posteriors: BTreeMap<String, (f64, f64)>,
    pub completed_at: DateTime<Utc>,
}

/// Cross-campaign posterior snapshot store.
#[async_trait]
pub trait MetaLearningStore: Send + Sync {
    /// Record a completed campaign's snapshot. Writes are serialized by
    /// the implementation.
    async fn record(&self, snapshot: &MetaSnapshot) -> Result<(), PersistenceError>;

    /// All recorded snapshots. The store is small; similarity ranking
    /// happens in the meta-learning service.
    async fn all(&self) -> Result<Vec<MetaSnapshot>, PersistenceError>;
}

/// In-memory campaign repository.
#[derive(Debug, Default)]
pub struct InMemoryCampaignRepository {
    campaigns: Mutex<HashMap<Uuid, Campaign>>,
}

impl InMemoryCampaignRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignRepository for InMemoryCampaignRepository {
    async fn insert(&self, campaign: &Campaign) -> Result<(), PersistenceError> {
        let mut campaigns = self.campaigns.lock().expect("lock poisoned");
        campaigns.insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn update(&self, campaign: &Campaign) -> Result<(), PersistenceError> {
        let mut campaigns = self.campaigns.lock().expect("lock poisoned");
        campaigns.insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Campaign>, PersistenceError> {
        let campaigns = self.campaigns.lock().expect("lock poisoned");
        Ok(campaigns.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<CampaignSummary>, PersistenceError> {
        let campaigns = self.campaigns.lock().expect("lock poisoned");
        let mut summaries: Vec<CampaignSummary> = campaigns
            .values()
            .map(|c| CampaignSummary {
                id: c.id,
                target_name: c.target.name.clone(),
                phase: c.phase,
                budget_remaining: c.budget_remaining,
                attempts: c.attempts.len(),
            })
            .collect();
        summaries.sort_by_key(|s| s.id);
        Ok(summaries)
    }
}

/// In-memory meta-learning store.
#[derive(Debug, Default)]
pub struct InMemoryMetaStore {
    snapshots: Mutex<Vec<MetaSnapshot>>,
}

impl InMemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetaLearningStore for InMemoryMetaStore {
    async fn record(&self, snapshot: &MetaSnapshot) -> Result<(), PersistenceError> {
        let mut snapshots = self.snapshots.lock().expect("lock poisoned");
        snapshots.retain(|s| s.campaign_id != snapshot.campaign_id);
        snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<MetaSnapshot>, PersistenceError> {
        let snapshots = self.snapshots.lock().expect("lock poisoned");
        Ok(snapshots.clone())
    }
}
