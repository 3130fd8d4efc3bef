use clap::Subcommand;

use super::demo::DemoArgs;
use super::plan::PlanArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Launch Chromium and run the Jira flow
    Run(RunArgs),

    /// Print the flow definition without opening a browser
    Plan(PlanArgs),

    /// Run the flow against an in-memory copy of the Jira markup
    Demo(DemoArgs),
}
