use anyhow::{Context, Result};
use clap::Args;

use super::env::CliArgs;
use super::output::render_flow;
use super::runtime::load_run_config;
use crate::jira::build_flow;

#[derive(Args, Clone, Debug)]
pub struct PlanArgs {}

pub fn cmd_plan(_args: PlanArgs, cli: &CliArgs) -> Result<()> {
    let config = load_run_config(cli.config.as_ref())?;
    let flow = build_flow(&config).context("Failed to build the Jira flow")?;
    print!("{}", render_flow(&flow, &cli.output)?);
    Ok(())
}
