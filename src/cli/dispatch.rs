use anyhow::Result;
use action_flow::FlowReport;

use super::demo::cmd_demo;
use super::env::CliArgs;
use super::plan::cmd_plan;
use super::run::cmd_run;
use crate::cli::commands::Commands;

/// Run the selected command. Commands that execute a flow hand back its report.
pub async fn dispatch(cli: &CliArgs) -> Result<Option<FlowReport>> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, cli).await.map(Some),
        Commands::Plan(args) => cmd_plan(args, cli).map(|()| None),
        Commands::Demo(args) => cmd_demo(args, cli).await.map(Some),
    }
}
