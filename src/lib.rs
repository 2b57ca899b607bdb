//! Redpilot - strategic planner for adversarial testing of AI systems.
//!
//! Given a description of a target (kind, access, goals, defenses,
//! budgets), the planner selects which attack techniques from a fixed
//! catalog to attempt next and, as results arrive, updates per-technique
//! Beta posteriors and re-ranks:
//! - Technique catalog with admissibility filtering and a seven-dimension
//!   weighted fit score
//! - Thompson sampling over benchmark-calibrated Beta posteriors with
//!   correlated family updates
//! - Two-phase campaign state machine (probe -> exploit) with SQLite
//!   persistence and bit-for-bit replay
//! - Beam search over the technique prerequisite DAG for multi-stage
//!   attack chains
//!
//! The planner only recommends; attack execution belongs to external
//! tools (garak, promptfoo, pyrit), whose results it can import.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use domain::models::{Campaign, PlannerConfig, TargetProfile, TechniqueCatalog};
pub use services::CampaignManager;
