use action_flow::FlowReport;
use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use super::dispatch::dispatch;
use super::env::{CliArgs, LONG_VERSION};
use super::runtime::{init_logging, load_local_env_overrides, local_env_path};

pub async fn run() -> Result<Option<FlowReport>> {
    let local_env = load_local_env_overrides();
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;

    match local_env {
        Ok(Some(applied)) => info!(
            path = %local_env_path().display(),
            applied,
            "Loaded environment overrides from local.env"
        ),
        Ok(None) => {}
        Err(err) => warn!("Ignoring local.env overrides: {:#}", err),
    }

    info!("Starting Waypoint v{}", LONG_VERSION);

    match dispatch(&cli).await {
        Ok(report) => {
            info!("Command completed");
            Ok(report)
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
