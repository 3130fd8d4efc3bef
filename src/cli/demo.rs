use std::sync::Arc;

use action_flow::{DefaultFlowExecutor, FlowExecutor, FlowReport};
use anyhow::{Context, Result};
use cdp_adapter::ScriptedDriver;
use clap::Args;
use tracing::info;

use super::env::CliArgs;
use super::output::{render_report, OutputFormat};
use crate::config::RunConfig;
use crate::jira::{build_flow, jira_site, SiteOptions, DEMO_BASE_URL, DEMO_EMAIL, DEMO_PASSWORD};

#[derive(Args, Clone, Debug)]
pub struct DemoArgs {
    /// Start from an already signed-in session; the login step is skipped
    #[arg(long)]
    pub signed_in: bool,

    /// Make the simulated site reject the credentials
    #[arg(long)]
    pub reject_login: bool,

    /// Run deadline in milliseconds
    #[arg(long, default_value_t = 120_000)]
    pub timeout_ms: u64,
}

pub async fn cmd_demo(args: DemoArgs, cli: &CliArgs) -> Result<FlowReport> {
    let env = [
        ("BASE_URL", DEMO_BASE_URL.to_string()),
        ("LOGIN_EMAIL", DEMO_EMAIL.to_string()),
        ("LOGIN_PASSWORD", DEMO_PASSWORD.to_string()),
        ("RUN_TIMEOUT_MS", args.timeout_ms.to_string()),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect();
    let config = RunConfig::from_sources(None, Some(env)).context("Invalid demo configuration")?;
    let flow = build_flow(&config).context("Failed to build the Jira flow")?;

    let site = jira_site(
        &config.base_url,
        SiteOptions {
            signed_in: args.signed_in,
            reject_login: args.reject_login,
        },
    );
    let driver = Arc::new(ScriptedDriver::new(site));
    info!(base_url = %config.base_url, "Running flow against the simulated site");

    let report = DefaultFlowExecutor::new(driver.clone())
        .execute(&flow)
        .await
        .context("Flow rejected")?;

    print!("{}", render_report(&report, &cli.output)?);
    if matches!(cli.output, OutputFormat::Human) {
        println!("Interactions delivered:");
        for record in driver.interactions() {
            println!(
                "  {:<20} {:<12} {:?}",
                record.element, record.interaction, record.path
            );
        }
    }
    Ok(report)
}
