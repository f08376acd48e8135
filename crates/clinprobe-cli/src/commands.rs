//! CLI argument definitions using clap

use clap::Parser;
use clinprobe::{StartupConfig, DEFAULT_LOCK_FILE};
use std::path::PathBuf;

use crate::error::{CliError, CliResult};

/// Clinprobe: end-to-end smoke run against the clinical web application
///
/// Signs in, registers a test patient with uploads, waits for processing,
/// checks the results and widgets, then deletes the patient.
#[derive(Parser, Debug)]
#[command(name = "clinprobe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Load variables from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Run Chromium without a window
    #[arg(long)]
    pub headless: bool,

    /// Chromium executable (auto-detected when omitted)
    #[arg(long, value_name = "PATH", env = "CHROME_PATH")]
    pub chrome: Option<PathBuf>,

    /// Disable the Chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Single-instance lock file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOCK_FILE)]
    pub lock_file: PathBuf,

    /// Log file (overrides CLINPROBE_LOG)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Use ASCII log tags instead of emoji
    #[arg(long)]
    pub ascii: bool,
}

impl Cli {
    /// Process-level settings for this run
    pub fn startup_config(&self) -> CliResult<StartupConfig> {
        if self.lock_file.as_os_str().is_empty() {
            return Err(CliError::config("--lock-file must not be empty"));
        }
        Ok(StartupConfig {
            env_file: self.env_file.clone(),
            lock_file: self.lock_file.clone(),
            log_file: self.log_file.clone(),
            headless: self.headless,
            chrome: self.chrome.clone(),
            sandbox: !self.no_sandbox,
            ascii: self.ascii,
        })
    }
}
