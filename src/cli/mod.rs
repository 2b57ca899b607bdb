//! CLI interface module
//!
//! Command definitions and handlers for the operator-facing surface:
//! planning, target validation, catalog queries, campaign lifecycle, and
//! chain planning. Report rendering is delegated to external tooling; the
//! `report` command emits the campaign document for it.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::campaign::CampaignArgs;
use commands::techniques::TechniquesArgs;

#[derive(Parser, Debug)]
#[command(name = "redpilot", version, about = "Strategic planner for adversarial testing of AI systems")]
pub struct Cli {
    /// Path to a config file (defaults to .redpilot/config.yaml hierarchy)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to a technique catalog (defaults to the builtin catalog)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Produce a one-shot ranked plan for a target document
    Plan {
        /// Path to the target YAML document
        target: PathBuf,
        /// Seed for reproducible sampling
        #[arg(long)]
        seed: Option<u64>,
        /// Include the scoring sensitivity analysis
        #[arg(long)]
        sensitivity: bool,
    },
    /// Validate a target document and report every violation
    Validate {
        /// Path to the target YAML document
        target: PathBuf,
    },
    /// List catalog techniques with optional filters
    Techniques(TechniquesArgs),
    /// Plan multi-stage attack chains for a target
    Chains {
        /// Path to the target YAML document
        target: PathBuf,
        /// Read posteriors from an existing campaign instead of priors
        #[arg(long)]
        campaign: Option<String>,
    },
    /// Campaign lifecycle operations
    Campaign(CampaignArgs),
}
