//! SQLite meta-learning snapshot store.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::PersistenceError;
use crate::domain::ports::{MetaLearningStore, MetaSnapshot};

pub struct SqliteMetaStore {
    pool: SqlitePool,
}

impl SqliteMetaStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetaLearningStore for SqliteMetaStore {
    async fn record(&self, snapshot: &MetaSnapshot) -> Result<(), PersistenceError> {
        let document = serde_json::to_string(snapshot)?;

        sqlx::query(
            r"
            INSERT INTO meta_snapshots (campaign_id, fingerprint, document, completed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(campaign_id) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                document = excluded.document,
                completed_at = excluded.completed_at
            ",
        )
        .bind(snapshot.campaign_id.to_string())
        .bind(&snapshot.fingerprint)
        .bind(&document)
        .bind(snapshot.completed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn all(&self) -> Result<Vec<MetaSnapshot>, PersistenceError> {
        let rows = sqlx::query("SELECT document FROM meta_snapshots ORDER BY completed_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let document: String = row.get("document");
                Ok(serde_json::from_str(&document)?)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::connection::create_migrated_test_pool;
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    fn snapshot() -> MetaSnapshot {
        let mut posteriors = BTreeMap::new();
        posteriors.insert("AP-TX-LLM-JB-DAN".to_string(), (9.0, 3.0));
        MetaSnapshot {
            campaign_id: Uuid::new_v4(),
            fingerprint: "access:black-box|kind:chatbot".to_string(),
            features: BTreeSet::from(["kind:chatbot".to_string()]),
            posteriors,
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let pool = create_migrated_test_pool().await.unwrap();
        let store = SqliteMetaStore::new(pool);

        let snapshot = snapshot();
        store.record(&snapshot).await.unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].campaign_id, snapshot.campaign_id);
        assert_eq!(all[0].posteriors.get("AP-TX-LLM-JB-DAN"), Some(&(9.0, 3.0)));
    }

    #[tokio::test]
    async fn test_record_is_idempotent_per_campaign() {
        let pool = create_migrated_test_pool().await.unwrap();
        let store = SqliteMetaStore::new(pool);

        let snapshot = snapshot();
        store.record(&snapshot).await.unwrap();
        store.record(&snapshot).await.unwrap();

        assert_eq!(store.all().await.unwrap().len(), 1);
    }
}
