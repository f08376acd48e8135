//! Clinprobe CLI: one end-to-end smoke run of the clinical web application
//!
//! ## Usage
//!
//! ```bash
//! clinprobe                          # Run with ./.env and a visible browser
//! clinprobe --headless --no-sandbox  # CI container
//! clinprobe --env-file staging.env --log-file run.log --ascii
//! ```
//!
//! Exit code 0 when every executed action passed, 1 when one failed, 2 when
//! the run could not start.

use clap::Parser;
use clinprobe_cli::{exit_code, print_summary, run, startup_failure, Cli, CliResult};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome: CliResult<_> = async {
        let startup = cli.startup_config()?;
        run(&startup).await
    }
    .await;

    match outcome {
        Ok(report) => {
            print_summary(&report);
            ExitCode::from(exit_code(report.verdict()))
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(startup_failure(&e))
        }
    }
}
