use std::process::ExitCode;

use waypoint_cli::cli::app;

#[tokio::main]
async fn main() -> ExitCode {
    match app::run().await {
        Ok(Some(report)) if !report.succeeded() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(1)
        }
    }
}
