//! Run configuration.
//!
//! Values come from the process environment. The env file is loaded once, at
//! startup, by [`StartupConfig::load_environment`]. Credentials and API
//! settings stay optional here: a missing value only fails the step that
//! needs it.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::BrowserConfig;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::{DEFAULT_STAGE_TIMEOUT_MS, DEFAULT_TEXT_POLL_MS};

/// Login page of the staging application
pub const DEFAULT_APP_URL: &str = "https://staging.voiston.ai/user/login?dp_id=MTA0";

/// Folder holding exam files to upload
pub const DEFAULT_EXAMS_DIR: &str = "arquivos/exames";

/// Folder holding record files to upload
pub const DEFAULT_RECORDS_DIR: &str = "arquivos/txts";

/// Append-only log file
pub const DEFAULT_LOG_FILE: &str = "testeAutomatico.log";

/// Lock file guarding against concurrent runs
pub const DEFAULT_LOCK_FILE: &str = "clinprobe.lock";

/// Longest single status check before the exams list is refreshed
pub const DEFAULT_REFRESH_ROUND_SECS: u64 = 60;

/// Settings read from the environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// `EMAIL`
    pub email: Option<String>,
    /// `PASSWORD`
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// `URL_API`, base of the deletion endpoint
    pub api_url: Option<String>,
    /// `API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// `APP_URL`
    pub app_url: String,
    /// `EXAMS_DIR`
    pub exams_dir: PathBuf,
    /// `RECORDS_DIR`
    pub records_dir: PathBuf,
    /// `STAGE_TIMEOUT_SECS`
    pub stage_timeout: Duration,
    /// `POLL_INTERVAL_SECS`
    pub poll_interval: Duration,
    /// `REFRESH_ROUND_SECS`
    pub refresh_round: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            api_url: None,
            api_key: None,
            app_url: DEFAULT_APP_URL.to_string(),
            exams_dir: PathBuf::from(DEFAULT_EXAMS_DIR),
            records_dir: PathBuf::from(DEFAULT_RECORDS_DIR),
            stage_timeout: Duration::from_millis(DEFAULT_STAGE_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_TEXT_POLL_MS),
            refresh_round: Duration::from_secs(DEFAULT_REFRESH_ROUND_SECS),
        }
    }
}

impl ProbeConfig {
    /// Read the process environment as it is; no env file is loaded here.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when a numeric variable does not parse
    pub fn from_env() -> ProbeResult<Self> {
        Self::from_lookup(env_var)
    }

    /// Build from an arbitrary key lookup.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when a numeric variable does not parse, or when
    /// `POLL_INTERVAL_SECS` is zero
    pub fn from_lookup<F>(lookup: F) -> ProbeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self {
            email: get("EMAIL"),
            password: get("PASSWORD"),
            api_url: get("URL_API"),
            api_key: get("API_KEY"),
            ..Self::default()
        };

        if let Some(value) = get("APP_URL") {
            config.app_url = value;
        }
        if let Some(value) = get("EXAMS_DIR") {
            config.exams_dir = PathBuf::from(value);
        }
        if let Some(value) = get("RECORDS_DIR") {
            config.records_dir = PathBuf::from(value);
        }
        if let Some(value) = get("STAGE_TIMEOUT_SECS") {
            config.stage_timeout = Duration::from_secs(parse_secs("STAGE_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = get("POLL_INTERVAL_SECS") {
            let secs = parse_secs("POLL_INTERVAL_SECS", &value)?;
            if secs == 0 {
                return Err(ProbeError::invalid_input(
                    "POLL_INTERVAL_SECS must be greater than zero",
                ));
            }
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(value) = get("REFRESH_ROUND_SECS") {
            config.refresh_round = Duration::from_secs(parse_secs("REFRESH_ROUND_SECS", &value)?);
        }

        Ok(config)
    }

    /// `URL_API`, or `ConfigMissing`
    ///
    /// # Errors
    ///
    /// `ConfigMissing` when unset
    pub fn require_api_url(&self) -> ProbeResult<&str> {
        self.api_url
            .as_deref()
            .ok_or_else(|| ProbeError::config_missing("URL_API"))
    }
}

/// Load variables from `path` into the process environment.
///
/// Variables already set in the environment win over the file.
///
/// # Errors
///
/// `InvalidInput` when the file is missing or malformed
pub fn load_env_file(path: &Path) -> ProbeResult<()> {
    dotenvy::from_path(path).map_err(|e| {
        ProbeError::invalid_input(format!("cannot load env file '{}': {e}", path.display()))
    })
}

/// Process-level settings fixed before the workflow starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    /// Explicit `.env` file; `None` tries `./.env`
    pub env_file: Option<PathBuf>,
    /// PID lock file
    pub lock_file: PathBuf,
    /// Log file, overriding `CLINPROBE_LOG`
    pub log_file: Option<PathBuf>,
    /// Run Chromium without a window
    pub headless: bool,
    /// Chromium executable
    pub chrome: Option<PathBuf>,
    /// Keep the Chromium sandbox (disable in containers)
    pub sandbox: bool,
    /// Force ASCII log tags
    pub ascii: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            env_file: None,
            lock_file: PathBuf::from(DEFAULT_LOCK_FILE),
            log_file: None,
            headless: false,
            chrome: None,
            sandbox: true,
            ascii: false,
        }
    }
}

impl StartupConfig {
    /// Load the env file: the explicit one, else `./.env` if present
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the explicit file is missing or malformed
    pub fn load_environment(&self) -> ProbeResult<()> {
        self.load_environment_from(Path::new("."))
    }

    /// Like [`Self::load_environment`], with `.env` looked up in `workdir`.
    ///
    /// An explicit file replaces `.env`; the two are never merged.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the explicit file is missing or malformed
    pub fn load_environment_from(&self, workdir: &Path) -> ProbeResult<()> {
        match self.env_file {
            Some(ref path) => load_env_file(path),
            None => {
                let implicit = workdir.join(".env");
                if implicit.is_file() {
                    load_env_file(&implicit)?;
                }
                Ok(())
            }
        }
    }

    /// Browser launch settings
    #[must_use]
    pub fn browser_config(&self) -> BrowserConfig {
        let mut config = BrowserConfig::default().with_headless(self.headless);
        if let Some(ref chrome) = self.chrome {
            config = config.with_chrome_path(chrome);
        }
        if !self.sandbox {
            config = config.with_no_sandbox();
        }
        config
    }

    /// Log file: explicit setting, else `CLINPROBE_LOG`, else the default
    #[must_use]
    pub fn resolve_log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .or_else(|| env_var("CLINPROBE_LOG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_secs(field: &str, value: &str) -> ProbeResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| {
            let message = format!("{field}: '{value}' is not a number of seconds ({e})");
            ProbeError::invalid_input(message)
        })
}
