//! SQLite connection pool management.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::errors::PersistenceError;

/// Database connection pool manager.
///
/// Manages a SQLite connection pool with WAL mode enabled for better
/// concurrency. Handles connection lifecycle, migrations, and configuration.
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Create a new connection pool with WAL mode enabled.
    ///
    /// # Configuration
    /// - Journal mode: WAL (Write-Ahead Logging)
    /// - Synchronous: NORMAL (good balance of safety and performance)
    /// - Foreign keys: enabled
    /// - Busy timeout: 5 seconds
    pub async fn new(database_url: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PersistenceError::Database(format!("invalid database URL: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PersistenceError::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Pool handle for repository implementations.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// A migrated in-memory pool, mainly for tests.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, PersistenceError> {
    let connection = DatabaseConnection::new("sqlite::memory:").await?;
    connection.migrate().await?;
    Ok(connection.pool().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_connection_and_migration() {
        let connection = DatabaseConnection::new("sqlite::memory:").await.unwrap();
        connection.migrate().await.unwrap();
        connection.close().await;
    }
}
