//! Tracing subscriber initialization.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::domain::models::config::LoggingConfig;

/// Initialize the global tracing subscriber from config.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
        }
    }
    Ok(())
}
