//! Wait policies and poll outcomes.
//!
//! Every bounded wait in the workflow (locating elements, watching status
//! text, waiting for panels to open) is described by a [`WaitPolicy`].

use crate::result::{ProbeError, ProbeResult};
use std::fmt;
use std::time::Duration;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for locating elements (20 seconds)
pub const DEFAULT_LOCATOR_TIMEOUT_MS: u64 = 20_000;

/// Default polling interval for locating elements (250ms)
pub const DEFAULT_LOCATOR_POLL_MS: u64 = 250;

/// Default budget for one processing stage (400 seconds)
pub const DEFAULT_STAGE_TIMEOUT_MS: u64 = 400_000;

/// Default interval between status-text checks (5 seconds)
pub const DEFAULT_TEXT_POLL_MS: u64 = 5_000;

// =============================================================================
// WAIT POLICY
// =============================================================================

/// Timeout and poll interval for a bounded wait.
///
/// Invariant: `poll_interval > 0`. A zero timeout is allowed and means
/// "check once".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    timeout: Duration,
    poll_interval: Duration,
}

impl WaitPolicy {
    /// Create a policy, rejecting a zero poll interval
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `poll_interval` is zero
    pub fn new(timeout: Duration, poll_interval: Duration) -> ProbeResult<Self> {
        if poll_interval.is_zero() {
            return Err(ProbeError::invalid_input(
                "wait policy poll interval must be greater than zero",
            ));
        }
        Ok(Self {
            timeout,
            poll_interval,
        })
    }

    /// Policy used to locate elements
    #[must_use]
    pub const fn locator_default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_LOCATOR_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_LOCATOR_POLL_MS),
        }
    }

    /// Policy used for one processing stage
    #[must_use]
    pub const fn stage_default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_STAGE_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_TEXT_POLL_MS),
        }
    }

    /// Same poll interval, different timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total time the wait may take
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sleep between two checks
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::locator_default()
    }
}

// =============================================================================
// POLL OUTCOME
// =============================================================================

/// What a text-presence poll concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The text was not rendered at some poll tick before the timeout
    Disappeared,
    /// The text was still rendered when the timeout elapsed
    StillPresent,
    /// The page query failed; presence could not be confirmed
    Error(String),
}

impl PollOutcome {
    /// Legacy boolean: `true` means the text is still present (the wait failed).
    ///
    /// Query errors report `false`, so a flaky page never keeps a caller waiting.
    #[must_use]
    pub const fn still_present(&self) -> bool {
        matches!(self, Self::StillPresent)
    }

    /// Whether callers may proceed as if the text were gone
    #[must_use]
    pub const fn is_gone(&self) -> bool {
        !self.still_present()
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disappeared => write!(f, "disappeared"),
            Self::StillPresent => write!(f, "still present"),
            Self::Error(cause) => write!(f, "query failed ({cause})"),
        }
    }
}

/// Outcome of one poller call plus how long it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Fragment that was watched
    pub fragment: String,
    /// What the poller concluded
    pub outcome: PollOutcome,
    /// Wall-clock time spent
    pub elapsed: Duration,
    /// Number of page queries made
    pub polls: u32,
}
