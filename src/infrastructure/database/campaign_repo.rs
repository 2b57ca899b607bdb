//! SQLite campaign repository.
//!
//! Campaigns persist as self-describing JSON documents in a single row;
//! a few denormalized columns support listing without parsing documents.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::PersistenceError;
use crate::domain::models::campaign::{Campaign, CampaignDocument, Phase};
use crate::domain::ports::{CampaignRepository, CampaignSummary};

pub struct SqliteCampaignRepository {
    pool: SqlitePool,
    /// Version hash of the runtime catalog; documents created against a
    /// different catalog fail loading with a remediation hint.
    catalog_version: String,
}

impl SqliteCampaignRepository {
    pub fn new(pool: SqlitePool, catalog_version: impl Into<String>) -> Self {
        Self {
            pool,
            catalog_version: catalog_version.into(),
        }
    }

    async fn upsert(&self, campaign: &Campaign) -> Result<(), PersistenceError> {
        let document = CampaignDocument::wrap(campaign.clone()).to_json()?;
        let id = campaign.id.to_string();
        let phase = campaign.phase.to_string();
        let updated_at = Utc::now().to_rfc3339();
        let attempts = i64::try_from(campaign.attempts.len()).unwrap_or(i64::MAX);

        sqlx::query(
            r"
            INSERT INTO campaigns (id, target_name, phase, budget_remaining, attempts, document, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                target_name = excluded.target_name,
                phase = excluded.phase,
                budget_remaining = excluded.budget_remaining,
                attempts = excluded.attempts,
                document = excluded.document,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&id)
        .bind(&campaign.target.name)
        .bind(&phase)
        .bind(i64::from(campaign.budget_remaining))
        .bind(attempts)
        .bind(&document)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CampaignRepository for SqliteCampaignRepository {
    async fn insert(&self, campaign: &Campaign) -> Result<(), PersistenceError> {
        self.upsert(campaign).await
    }

    async fn update(&self, campaign: &Campaign) -> Result<(), PersistenceError> {
        self.upsert(campaign).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Campaign>, PersistenceError> {
        let row = sqlx::query("SELECT document FROM campaigns WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let document: String = row.get("document");
                Ok(Some(CampaignDocument::from_json(
                    &document,
                    &self.catalog_version,
                )?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<CampaignSummary>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT id, target_name, phase, budget_remaining, attempts FROM campaigns ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let id: String = row.get("id");
                let phase: String = row.get("phase");
                let budget: i64 = row.get("budget_remaining");
                let attempts: i64 = row.get("attempts");
                Ok(CampaignSummary {
                    id: Uuid::from_str(&id)
                        .map_err(|e| PersistenceError::Database(format!("bad campaign id: {e}")))?,
                    target_name: row.get("target_name"),
                    phase: Phase::from_str(&phase)
                        .map_err(PersistenceError::Database)?,
                    budget_remaining: u32::try_from(budget).unwrap_or(0),
                    attempts: usize::try_from(attempts).unwrap_or(0),
                })
            })
            .collect()
    }
}
