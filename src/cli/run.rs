use std::path::PathBuf;
use std::sync::Arc;

use action_flow::{DefaultFlowExecutor, FlowExecutor, FlowReport};
use anyhow::{Context, Result};
use cdp_adapter::{CdpConfig, ChromiumDriver};
use clap::Args;
use tracing::{info, warn};

use super::env::CliArgs;
use super::output::render_report;
use super::runtime::load_run_config;
use crate::config::RunConfig;
use crate::jira::build_flow;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Show the browser window (overrides HEADLESS)
    #[arg(long)]
    pub headful: bool,

    /// Chrome/Chromium executable (overrides CHROME_PATH)
    #[arg(long)]
    pub chrome_path: Option<PathBuf>,

    /// Browser profile directory to reuse a signed-in session (overrides USER_DATA_DIR)
    #[arg(long)]
    pub user_data_dir: Option<PathBuf>,

    /// Run deadline in milliseconds (overrides RUN_TIMEOUT_MS)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl RunArgs {
    fn apply(&self, mut config: RunConfig) -> RunConfig {
        if self.headful {
            config.headless = false;
        }
        if let Some(path) = &self.chrome_path {
            config.chrome_path = Some(path.clone());
        }
        if let Some(dir) = &self.user_data_dir {
            config.user_data_dir = Some(dir.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms.filter(|ms| *ms > 0) {
            config.run_timeout_ms = timeout_ms;
        }
        config
    }
}

pub async fn cmd_run(args: RunArgs, cli: &CliArgs) -> Result<FlowReport> {
    let config = args.apply(load_run_config(cli.config.as_ref())?);
    let flow = build_flow(&config).context("Failed to build the Jira flow")?;

    let cdp_config = CdpConfig::default()
        .with_executable(config.chrome_path.clone())
        .with_user_data_dir(config.user_data_dir.clone())
        .with_headless(config.headless);
    info!(
        executable = %cdp_config.executable.display(),
        headless = cdp_config.headless,
        "Launching browser"
    );
    let driver = Arc::new(
        ChromiumDriver::launch(cdp_config)
            .await
            .context("Failed to launch Chromium")?,
    );

    let executor = DefaultFlowExecutor::new(driver.clone());
    let result = executor.execute(&flow).await;
    drop(executor);

    match Arc::try_unwrap(driver) {
        Ok(driver) => {
            if let Err(err) = driver.close().await {
                warn!("Failed to close browser cleanly: {}", err);
            }
        }
        Err(_) => warn!("Browser still referenced after the run; leaving it to drop"),
    }

    let report = result.context("Flow rejected")?;
    print!("{}", render_report(&report, &cli.output)?);
    Ok(report)
}
