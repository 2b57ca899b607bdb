//! Error taxonomy for the planner.
//!
//! Pure components return structured results and never swallow errors;
//! only the outermost handler (CLI) maps these to operator-visible codes.
//! An empty plan is a structured result, not an error — see
//! [`crate::domain::models::plan::PlanReason`].

use thiserror::Error;
use uuid::Uuid;

use super::models::campaign::Phase;
use super::models::catalog::CatalogError;
use super::models::target::TargetValidationError;

/// Persistence failures: I/O or schema/catalog version mismatch.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("campaign schema version mismatch: expected {expected}, found {found}; re-create the campaign or upgrade the runtime")]
    SchemaVersionMismatch { expected: String, found: String },

    #[error("catalog version mismatch: campaign was planned against {found}, runtime has {expected}; reload the matching catalog to replay")]
    CatalogVersionMismatch { expected: String, found: String },
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Top-level planner error taxonomy.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Catalog load/validation failure. Fatal at initialization.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Invalid target document, with every field-level violation.
    #[error(transparent)]
    TargetValidation(#[from] TargetValidationError),

    #[error("campaign not found: {0}")]
    CampaignNotFound(Uuid),

    #[error("campaign {0} is terminated and accepts no further operations")]
    CampaignTerminated(Uuid),

    #[error("unknown technique id: {0}")]
    UnknownTechnique(String),

    #[error("invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: Phase, to: Phase },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type PlannerResult<T> = Result<T, PlannerError>;
