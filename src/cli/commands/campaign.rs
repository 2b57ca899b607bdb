//! Campaign lifecycle commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::commands::plan::load_target;
use crate::cli::output::{print_json, table_with_header, truncate};
use crate::domain::models::CampaignDocument;
use crate::services::CampaignManager;

#[derive(Args, Debug)]
pub struct CampaignArgs {
    #[command(subcommand)]
    pub command: CampaignCommands,
}

#[derive(Subcommand, Debug)]
pub enum CampaignCommands {
    /// Create a campaign from a target document
    Create {
        /// Path to the target YAML document
        target: PathBuf,
        /// Seed for reproducible sampling
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Generate the next recommendation batch
    Recommend {
        id: String,
    },
    /// Record one attempt result
    Observe {
        id: String,
        /// Technique id the attempt executed
        technique: String,
        /// Outcome: success or failure
        outcome: String,
        /// Optional confidence in [0,1] for partial credit
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// Bulk-import external tool results (JSON array or JSONL file)
    Import {
        id: String,
        /// Path to the results payload
        file: PathBuf,
    },
    /// Re-execute the recorded history and verify reproducibility
    Replay {
        id: String,
    },
    /// Show campaign state
    Show {
        id: String,
    },
    /// Emit the full campaign document for an external report renderer
    Report {
        id: String,
    },
    /// List campaigns
    List,
    /// Operator-requested advance to the exploit phase
    Advance {
        id: String,
    },
    /// Terminate a campaign
    Terminate {
        id: String,
    },
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid campaign id: {raw}"))
}

fn parse_outcome(raw: &str) -> Result<bool> {
    match raw {
        "success" | "true" => Ok(true),
        "failure" | "false" => Ok(false),
        other => Err(anyhow!("outcome must be success or failure, got {other}")),
    }
}

pub async fn handle_campaign(
    manager: &CampaignManager,
    command: CampaignCommands,
    json: bool,
) -> Result<()> {
    match command {
        CampaignCommands::Create { target, seed } => {
            let profile = load_target(&target).await?;
            let campaign = manager.create(profile, seed).await?;
            if json {
                print_json(&campaign)?;
            } else {
                println!("Created campaign {}", campaign.id);
                println!("  phase: {}  budget: {}", campaign.phase, campaign.budget_remaining);
                println!("  seed: {}  audit: {}", campaign.seed, campaign.audit_token);
            }
        }
        CampaignCommands::Recommend { id } => {
            let batch = manager.recommend(parse_id(&id)?).await?;
            if json {
                print_json(&batch)?;
            } else {
                let mut table = table_with_header(&["#", "technique", "score", "posterior", "rationale"]);
                for (rank, entry) in batch.entries.iter().enumerate() {
                    table.add_row(vec![
                        (rank + 1).to_string(),
                        entry.technique_id.clone(),
                        format!("{:.3}", entry.final_score),
                        format!("{:.2}", entry.posterior_mean),
                        truncate(&entry.rationale, 48),
                    ]);
                }
                println!("{table}");
            }
        }
        CampaignCommands::Observe {
            id,
            technique,
            outcome,
            confidence,
        } => {
            let success = parse_outcome(&outcome)?;
            let campaign = manager
                .observe(parse_id(&id)?, &technique, success, confidence)
                .await?;
            if json {
                print_json(&campaign)?;
            } else {
                println!(
                    "Recorded {} on {} (phase: {}, budget left: {})",
                    outcome, technique, campaign.phase, campaign.budget_remaining
                );
            }
        }
        CampaignCommands::Import { id, file } => {
            let payload = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let outcome = manager.import_results(parse_id(&id)?, &payload).await?;
            if json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Applied {} result(s), {} warning(s); phase: {}, budget left: {}",
                    outcome.applied.len(),
                    outcome.warnings.len(),
                    outcome.phase_after,
                    outcome.budget_remaining
                );
                for warning in &outcome.warnings {
                    println!("  warning: {}: {}", warning.source_id, warning.message);
                }
            }
        }
        CampaignCommands::Replay { id } => {
            let report = manager.replay(parse_id(&id)?).await?;
            if json {
                print_json(&report)?;
            } else if report.is_faithful() {
                println!(
                    "Replay faithful: {}/{} batches matched, posteriors identical.",
                    report.batches_matched, report.batches_total
                );
            } else {
                println!(
                    "Replay diverged: {}/{} batches matched, posteriors match: {}",
                    report.batches_matched, report.batches_total, report.posteriors_match
                );
            }
        }
        CampaignCommands::Show { id } => {
            let campaign = manager.get(parse_id(&id)?).await?;
            if json {
                print_json(&campaign)?;
            } else {
                println!("Campaign {}", campaign.id);
                println!("  target: {} ({})", campaign.target.name, campaign.target.kind);
                println!("  phase: {}  budget left: {}", campaign.phase, campaign.budget_remaining);
                println!("  attempts: {}", campaign.attempts.len());
                println!("  posteriors: {}", campaign.posteriors.len());
                let mut table = table_with_header(&["technique", "mean", "95% interval", "α", "β"]);
                for (technique_id, posterior) in campaign.posteriors.iter() {
                    let (lower, upper) = posterior.wilson_bounds();
                    table.add_row(vec![
                        technique_id.clone(),
                        format!("{:.3}", posterior.mean()),
                        format!("[{lower:.2}, {upper:.2}]"),
                        format!("{:.2}", posterior.alpha),
                        format!("{:.2}", posterior.beta),
                    ]);
                }
                println!("{table}");
            }
        }
        CampaignCommands::Report { id } => {
            // The external renderer consumes the self-describing document.
            let campaign = manager.get(parse_id(&id)?).await?;
            print_json(&CampaignDocument::wrap(campaign))?;
        }
        CampaignCommands::List => {
            let summaries = manager.list().await?;
            if json {
                print_json(&summaries)?;
            } else {
                let mut table = table_with_header(&["id", "target", "phase", "attempts", "budget"]);
                for summary in &summaries {
                    table.add_row(vec![
                        summary.id.to_string(),
                        summary.target_name.clone(),
                        summary.phase.to_string(),
                        summary.attempts.to_string(),
                        summary.budget_remaining.to_string(),
                    ]);
                }
                println!("{table}");
            }
        }
        CampaignCommands::Advance { id } => {
            let campaign = manager.advance(parse_id(&id)?).await?;
            if json {
                print_json(&campaign)?;
            } else {
                println!("Campaign {} advanced to {}", campaign.id, campaign.phase);
            }
        }
        CampaignCommands::Terminate { id } => {
            let campaign = manager.terminate(parse_id(&id)?).await?;
            if json {
                print_json(&campaign)?;
            } else {
                println!("Campaign {} terminated.", campaign.id);
            }
        }
    }
    Ok(())
}
