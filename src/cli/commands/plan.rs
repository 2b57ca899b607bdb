//! Plan, validate, and chains commands.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::output::{print_json, table_with_header, truncate};
use crate::domain::models::posterior::PosteriorStore;
use crate::domain::models::{PlannerConfig, TargetDocument, TargetProfile, TechniqueCatalog};
use crate::services::chain_planner::plan_chains;
use crate::services::prior_library::PriorLibrary;
use crate::services::scorer::TechniqueScorer;
use crate::services::{admissibility, CampaignManager};

/// Load and validate a target document from disk.
pub async fn load_target(path: &Path) -> Result<TargetProfile> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read target document {}", path.display()))?;
    let document = TargetDocument::from_yaml(&text)
        .with_context(|| format!("failed to parse target document {}", path.display()))?;

    for warning in document.unknown_field_warnings() {
        tracing::warn!("{warning}");
    }
    Ok(document.validate()?)
}

pub async fn handle_plan(
    manager: &CampaignManager,
    target_path: &Path,
    seed: Option<u64>,
    sensitivity: bool,
    json: bool,
) -> Result<()> {
    let target = load_target(target_path).await?;
    let plan = manager.plan_for_target(&target, seed.unwrap_or(0));

    if json {
        print_json(&plan)?;
    } else if plan.entries.is_empty() {
        println!(
            "No admissible techniques for target '{}'.",
            plan.target_name
        );
    } else {
        let mut table =
            table_with_header(&["#", "technique", "score", "posterior", "z", "rationale"]);
        for (rank, entry) in plan.entries.iter().enumerate() {
            table.add_row(vec![
                (rank + 1).to_string(),
                entry.technique_id.clone(),
                format!("{:.3}", entry.final_score),
                format!(
                    "{:.2} [{:.2}, {:.2}]",
                    entry.posterior_mean, entry.wilson_lower, entry.wilson_upper
                ),
                format!("{:+.2}", entry.z_score),
                truncate(&entry.rationale, 48),
            ]);
        }
        println!("{table}");
    }

    if sensitivity {
        let admissible = admissibility::admissible(manager.catalog(), &target);
        let scorer = TechniqueScorer::new(manager.config().scoring.clone());
        let reports = scorer.sensitivity(&target, &admissible);
        if json {
            print_json(&reports)?;
        } else {
            let mut table = table_with_header(&["dimension", "τ −20%", "τ +20%", "sensitive"]);
            for report in reports {
                table.add_row(vec![
                    report.dimension,
                    format!("{:.3}", report.tau_down),
                    format!("{:.3}", report.tau_up),
                    report.rank_sensitive.to_string(),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}

pub async fn handle_validate(target_path: &Path, json: bool) -> Result<()> {
    let text = tokio::fs::read_to_string(target_path)
        .await
        .with_context(|| format!("failed to read target document {}", target_path.display()))?;
    let document = TargetDocument::from_yaml(&text)?;
    let warnings = document.unknown_field_warnings();

    match document.validate() {
        Ok(profile) => {
            if json {
                print_json(&serde_json::json!({
                    "valid": true,
                    "target": profile,
                    "warnings": warnings,
                }))?;
            } else {
                println!("Target '{}' is valid.", profile.name);
                for warning in warnings {
                    println!("  warning: {warning}");
                }
            }
            Ok(())
        }
        Err(err) => {
            if json {
                print_json(&serde_json::json!({
                    "valid": false,
                    "violations": err.violations,
                    "warnings": warnings,
                }))?;
            } else {
                println!("Target document is invalid:");
                for violation in &err.violations {
                    println!("  - {violation}");
                }
            }
            std::process::exit(1);
        }
    }
}

pub async fn handle_chains(
    manager: &CampaignManager,
    catalog: &Arc<TechniqueCatalog>,
    priors: &Arc<PriorLibrary>,
    config: &PlannerConfig,
    target_path: &Path,
    campaign_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let target = load_target(target_path).await?;

    let posteriors = match campaign_id {
        Some(raw) => {
            let id = Uuid::parse_str(raw).context("invalid campaign id")?;
            manager.get(id).await?.posteriors
        }
        None => PosteriorStore::new(),
    };

    let chains = plan_chains(catalog, priors, &config.chain, &target, &posteriors);

    if json {
        print_json(&chains)?;
    } else if chains.is_empty() {
        println!("No chains available for target '{}'.", target.name);
    } else {
        for (rank, chain) in chains.iter().enumerate() {
            println!(
                "{}. p={:.4}  {}",
                rank + 1,
                chain.joint_probability,
                chain.technique_ids().join(" -> ")
            );
            println!("   {}", chain.narrative);
        }
    }
    Ok(())
}
