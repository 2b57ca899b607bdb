//! Application services for the planning engine.

pub mod admissibility;
pub mod campaign_manager;
pub mod chain_planner;
pub mod import;
pub mod meta_learning;
pub mod prior_library;
pub mod sampler;
pub mod scorer;

pub use admissibility::{admissible, is_admissible};
pub use campaign_manager::{CampaignManager, ImportOutcome, ReplayReport};
pub use chain_planner::plan_chains;
pub use import::{
    map_identifier, map_results, parse_payload, ImportWarningRecord, MappedObservation,
    ToolResultRecord, GARAK_PROBE_MAP, PROMPTFOO_TEST_MAP,
};
pub use meta_learning::{feature_set, fingerprint, weighted_jaccard_distance, MetaLearner};
pub use prior_library::{BetaPrior, PriorLibrary};
pub use sampler::{execution_hooks, recommend};
pub use scorer::{kendall_tau, TechniqueScorer};
