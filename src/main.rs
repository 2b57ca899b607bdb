//! Redpilot CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use redpilot::cli::commands::{campaign, plan, techniques};
use redpilot::cli::{Cli, Commands};
use redpilot::domain::models::PlannerConfig;
use redpilot::infrastructure::catalog::CatalogLoader;
use redpilot::infrastructure::config::ConfigLoader;
use redpilot::infrastructure::database::{
    DatabaseConnection, SqliteCampaignRepository, SqliteMetaStore,
};
use redpilot::infrastructure::logging;
use redpilot::services::prior_library::PriorLibrary;
use redpilot::services::CampaignManager;
use redpilot::TechniqueCatalog;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load().context("Failed to load configuration")?,
    };

    logging::init(&config.logging)?;

    // Load the technique catalog (builtin unless overridden)
    let catalog = Arc::new(match &cli.catalog {
        Some(path) => CatalogLoader::load_file(path).await?,
        None => CatalogLoader::builtin()?,
    });
    let priors = Arc::new(PriorLibrary::builtin());

    // Stateless commands run without a database.
    match &cli.command {
        Commands::Validate { target } => {
            return plan::handle_validate(target, cli.json).await;
        }
        Commands::Techniques(args) => {
            return techniques::handle_techniques(&catalog, args, cli.json);
        }
        _ => {}
    }

    let manager = build_manager(&config, catalog.clone(), priors.clone()).await?;

    match cli.command {
        Commands::Plan {
            target,
            seed,
            sensitivity,
        } => plan::handle_plan(&manager, &target, seed, sensitivity, cli.json).await,
        Commands::Chains {
            target,
            campaign: campaign_id,
        } => {
            plan::handle_chains(
                &manager,
                &catalog,
                &priors,
                &config,
                &target,
                campaign_id.as_deref(),
                cli.json,
            )
            .await
        }
        Commands::Campaign(args) => campaign::handle_campaign(&manager, args.command, cli.json).await,
        Commands::Validate { .. } | Commands::Techniques(_) => {
            unreachable!("stateless commands handled above")
        }
    }
}

async fn build_manager(
    config: &PlannerConfig,
    catalog: Arc<TechniqueCatalog>,
    priors: Arc<PriorLibrary>,
) -> Result<CampaignManager> {
    if let Some(parent) = Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let database_url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::new(&database_url)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run database migrations")?;

    let repo = Arc::new(SqliteCampaignRepository::new(
        db.pool().clone(),
        catalog.version_hash(),
    ));
    let meta = Arc::new(SqliteMetaStore::new(db.pool().clone()));

    Ok(CampaignManager::new(
        catalog,
        priors,
        config.clone(),
        repo,
        meta,
    ))
}
