//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod campaign;
pub mod catalog;
pub mod config;
pub mod plan;
pub mod posterior;
pub mod target;
pub mod technique;

pub use campaign::{AttemptRecord, Campaign, CampaignDocument, Phase, CAMPAIGN_SCHEMA_VERSION};
pub use catalog::{CatalogError, CatalogViolation, TechniqueCatalog};
pub use config::{
    BudgetConfig, ChainConfig, CorrelationConfig, DatabaseConfig, DefenseBypassMode,
    LoggingConfig, MetaConfig, PhaseConfig, PlannerConfig, SamplerConfig, ScoreWeights,
    ScoringConfig,
};
pub use plan::{
    AttackChain, ChainStep, ExecutionHook, PlanReason, PlanResponse, Recommendation,
    RecommendationBatch, ScoreBreakdown, ScoredTechnique, SensitivityReport,
};
pub use posterior::{BetaPosterior, PosteriorSnapshot, PosteriorStore};
pub use target::{
    StealthPriority, TargetDocument, TargetProfile, TargetValidationError, TargetViolation,
    KNOWN_DEFENSE_FLAGS, TARGET_SCHEMA_VERSION,
};
pub use technique::{
    AccessLevel, AttackDomain, ComplianceRefs, Cost, Goal, Prerequisite, StealthProfile,
    Surface, TargetKind, Technique, ToolSupport,
};
