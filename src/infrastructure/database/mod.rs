//! SQLite persistence infrastructure.

pub mod campaign_repo;
pub mod connection;
pub mod meta_repo;

pub use campaign_repo::SqliteCampaignRepository;
pub use connection::{create_migrated_test_pool, DatabaseConnection};
pub use meta_repo::SqliteMetaStore;
