//! One smoke run from startup to verdict

use clinprobe::{
    init_logging, BrowserConfig, InstanceLock, ProbeConfig, RunReport, StartupConfig, TagStyle,
    Verdict,
};

use crate::error::{CliError, CliResult};

/// Every executed action passed
pub const EXIT_PASSED: u8 = 0;

/// At least one action failed
pub const EXIT_FAILED: u8 = 1;

/// The run could not start
pub const EXIT_STARTUP_ERROR: u8 = 2;

/// Exit code for a finished run
#[must_use]
pub const fn exit_code(verdict: Verdict) -> u8 {
    match verdict {
        Verdict::Passed => EXIT_PASSED,
        Verdict::Failed => EXIT_FAILED,
    }
}

/// Tag style: forced ASCII or detected from the locale
#[must_use]
pub fn tag_style(startup: &StartupConfig) -> TagStyle {
    if startup.ascii {
        TagStyle::Ascii
    } else {
        TagStyle::detect()
    }
}

/// Start logging, take the instance lock, read configuration and run the workflow.
///
/// The env file is loaded first so `CLINPROBE_LOG` applies to logging.
pub async fn run(startup: &StartupConfig) -> CliResult<RunReport> {
    startup.load_environment()?;
    init_logging(&startup.resolve_log_file(), tag_style(startup))?;

    let lock = InstanceLock::acquire(&startup.lock_file)?;
    tracing::debug!(pid = lock.pid(), "Holding {}", lock.path().display());

    let config = ProbeConfig::from_env()?;
    tracing::info!(tag = "starting", "Starting smoke run against {}", config.app_url);

    let report = drive(config, &startup.browser_config()).await?;
    drop(lock);
    Ok(report)
}

#[cfg(feature = "browser")]
async fn drive(config: ProbeConfig, browser: &BrowserConfig) -> CliResult<RunReport> {
    use clinprobe::{Actions, CdpDriver, Workflow};

    let driver = CdpDriver::launch(browser).await?;
    let mut workflow = Workflow::new(Actions::new(&driver), config);
    Ok(workflow.run().await)
}

#[cfg(not(feature = "browser"))]
async fn drive(_config: ProbeConfig, _browser: &BrowserConfig) -> CliResult<RunReport> {
    Err(CliError::BrowserUnavailable)
}

/// Map a startup failure to its exit code, logging it when logging is up
#[must_use]
pub fn startup_failure(err: &CliError) -> u8 {
    tracing::error!("{err}");
    EXIT_STARTUP_ERROR
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_forced_ascii() {
        let startup = StartupConfig {
            ascii: true,
            ..StartupConfig::default()
        };
        assert_eq!(tag_style(&startup), TagStyle::Ascii);
    }

    #[tokio::test]
    async fn test_missing_explicit_env_file_stops_run() {
        let dir = TempDir::new().unwrap();
        let startup = StartupConfig {
            env_file: Some(dir.path().join("absent.env")),
            ..StartupConfig::default()
        };
        let err = run(&startup).await.unwrap_err();
        assert!(matches!(
            err,
            CliError::Probe(clinprobe::ProbeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(Verdict::Passed), 0);
        assert_eq!(exit_code(Verdict::Failed), 1);
        assert_eq!(startup_failure(&CliError::BrowserUnavailable), 2);
    }
}
