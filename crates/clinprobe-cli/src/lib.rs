//! Clinprobe CLI Library
//!
//! Argument parsing, the startup sequence and the end-of-run summary for
//! the `clinprobe` binary.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod error;
mod output;
mod runner;

pub use commands::Cli;
pub use error::{CliError, CliResult};
pub use output::{print_summary, summary_lines};
pub use runner::{
    exit_code, run, startup_failure, tag_style, EXIT_FAILED, EXIT_PASSED, EXIT_STARTUP_ERROR,
};
