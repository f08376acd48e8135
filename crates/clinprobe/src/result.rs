//! Result and error types for clinprobe.

use std::time::Duration;
use thiserror::Error;

/// Result type for clinprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving the workflow
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Elements matched but never became interactable within the wait policy
    #[error("Element {locator} was found but not ready after {}ms", .waited.as_millis())]
    LocatorTimeout {
        /// Human-readable locator
        locator: String,
        /// Time spent waiting
        waited: Duration,
    },

    /// Nothing ever matched the locator
    #[error("Element {locator} was not found after {}ms", .waited.as_millis())]
    LocatorNotFound {
        /// Human-readable locator
        locator: String,
        /// Time spent waiting
        waited: Duration,
    },

    /// A value handed to an action was unusable
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message
        message: String,
    },

    /// Locator kind outside the supported set
    #[error("Locator kind '{kind}' is not supported")]
    UnsupportedLocatorKind {
        /// Kind that was requested
        kind: String,
    },

    /// A processing stage did not finish within its budget
    #[error("Stage '{stage}' timed out after {:.2}s", .elapsed.as_secs_f64())]
    StageTimedOut {
        /// Stage label
        stage: String,
        /// Time spent in the stage
        elapsed: Duration,
    },

    /// The deletion endpoint answered with a non-success status or could not be reached
    #[error("HTTP error{}: {message}", .status.map(|s| format!(" {s}")).unwrap_or_default())]
    HttpError {
        /// Status code, if a response was received
        status: Option<u16>,
        /// Response body or transport error
        message: String,
    },

    /// A required environment variable is absent
    #[error("Missing configuration value {key}")]
    ConfigMissing {
        /// Variable name
        key: String,
    },

    /// Browser could not be started
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page driver error
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Another instance holds the lock file
    #[error(
        "Another instance is already running ({}, lock {path})",
        .pid.map_or_else(|| "pid unknown".to_string(), |pid| format!("pid {pid}"))
    )]
    InstanceLocked {
        /// Process holding the lock, once it has written its PID
        pid: Option<u32>,
        /// Lock file path
        path: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Create an invalid input error
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a missing configuration error
    #[must_use]
    pub fn config_missing(key: impl Into<String>) -> Self {
        Self::ConfigMissing { key: key.into() }
    }

    /// Whether the error came from a wait running out of time
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::LocatorTimeout { .. } | Self::StageTimedOut { .. }
        )
    }
}

#[cfg(feature = "browser")]
impl From<chromiumoxide::error::CdpError> for ProbeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::driver(err.to_string())
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpError {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_errors_mention_locator() {
        let err = ProbeError::LocatorNotFound {
            locator: "id=email".to_string(),
            waited: Duration::from_millis(1500),
        };
        assert_eq!(
            err.to_string(),
            "Element id=email was not found after 1500ms"
        );
    }

    #[test]
    fn test_stage_timeout_message() {
        let err = ProbeError::StageTimedOut {
            stage: "upload".to_string(),
            elapsed: Duration::from_millis(2500),
        };
        assert_eq!(err.to_string(), "Stage 'upload' timed out after 2.50s");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_http_error_with_and_without_status() {
        let with_status = ProbeError::HttpError {
            status: Some(404),
            message: "not found".to_string(),
        };
        assert_eq!(with_status.to_string(), "HTTP error 404: not found");

        let transport = ProbeError::HttpError {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(transport.to_string(), "HTTP error: connection refused");
    }

    #[test]
    fn test_helpers() {
        assert!(ProbeError::invalid_input("x")
            .to_string()
            .contains("Invalid input"));
        assert!(ProbeError::config_missing("API_KEY")
            .to_string()
            .contains("API_KEY"));
        assert!(!ProbeError::driver("boom").is_timeout());
    }
}
