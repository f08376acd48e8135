//! Processing-completion state machine.
//!
//! A backend job moves through upload acknowledgement, ingestion and
//! per-file processing. Each stage is observable only through status text, so
//! every stage is a set of text fragments that must all be gone before the
//! stage counts as complete.
//!
//! ```text
//! Idle -> AwaitingUploadAck -> AwaitingIngestion -> AwaitingPerFileProcessing -> Done
//!              \                     \                        \
//!               +---------------------+------------------------+--> TimedOut
//! ```
//!
//! `TimedOut` is absorbing: once a stage times out, later stages on the same
//! monitor are skipped.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::actions::Actions;
use crate::locator::LocatorSpec;
use crate::poller::await_text_gone;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::{PollReport, WaitPolicy};

/// One backend processing step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    /// Files are being uploaded
    UploadAck,
    /// Uploaded files are queued or being parsed
    Ingestion,
    /// Measurements are being extracted per file
    PerFileProcessing,
}

impl StageKind {
    /// Waiting state for this stage
    #[must_use]
    pub const fn awaiting(self) -> StageState {
        match self {
            Self::UploadAck => StageState::AwaitingUploadAck,
            Self::Ingestion => StageState::AwaitingIngestion,
            Self::PerFileProcessing => StageState::AwaitingPerFileProcessing,
        }
    }

    /// State entered once this stage completes
    #[must_use]
    pub const fn completed(self) -> StageState {
        match self {
            Self::UploadAck => StageState::AwaitingIngestion,
            Self::Ingestion => StageState::AwaitingPerFileProcessing,
            Self::PerFileProcessing => StageState::Done,
        }
    }

    const fn order(self) -> u8 {
        match self {
            Self::UploadAck => 1,
            Self::Ingestion => 2,
            Self::PerFileProcessing => 3,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UploadAck => "upload",
            Self::Ingestion => "ingestion",
            Self::PerFileProcessing => "per-file processing",
        })
    }
}

/// Monitor state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageState {
    /// Nothing awaited yet
    Idle,
    /// Waiting for the upload to be acknowledged
    AwaitingUploadAck,
    /// Waiting for ingestion
    AwaitingIngestion,
    /// Waiting for per-file processing
    AwaitingPerFileProcessing,
    /// Every stage completed
    Done,
    /// A stage ran out of budget
    TimedOut {
        /// Stage that timed out
        stage: StageKind,
        /// Time spent in that stage
        elapsed: Duration,
    },
}

impl StageState {
    const fn order(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::AwaitingUploadAck => 1,
            Self::AwaitingIngestion => 2,
            Self::AwaitingPerFileProcessing => 3,
            Self::Done => 4,
            Self::TimedOut { .. } => u8::MAX,
        }
    }
}

/// Conditions and budget for one stage
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// Which stage this is
    pub kind: StageKind,
    /// Status fragments that must all be gone
    pub conditions: Vec<String>,
    /// Policy for each condition check
    pub policy: WaitPolicy,
    /// Total time the stage may take
    pub budget: Duration,
    /// Element clicked between rounds to refresh the status list
    pub refresh: Option<LocatorSpec>,
}

impl StageSpec {
    /// Fail-fast stage: one round, each condition polled with `policy`
    #[must_use]
    pub fn new<I, S>(kind: StageKind, conditions: I, policy: WaitPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            conditions: conditions.into_iter().map(Into::into).collect(),
            policy,
            budget: policy.timeout(),
            refresh: None,
        }
    }

    /// Click `refresh` and re-check until `budget` is spent
    #[must_use]
    pub fn with_refresh(mut self, refresh: LocatorSpec, budget: Duration) -> Self {
        self.refresh = Some(refresh);
        self.budget = budget;
        self
    }
}

/// Result of checking every condition of a stage once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCheck {
    /// One report per condition, in declaration order
    pub reports: Vec<PollReport>,
}

impl StageCheck {
    /// Every condition is gone
    #[must_use]
    pub fn all_gone(&self) -> bool {
        self.reports.iter().all(|r| r.outcome.is_gone())
    }

    /// Legacy per-condition booleans (`true` = still present)
    #[must_use]
    pub fn still_present(&self) -> Vec<bool> {
        self.reports
            .iter()
            .map(|r| r.outcome.still_present())
            .collect()
    }

    /// Fragments still rendered at their timeout
    #[must_use]
    pub fn blocking(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.outcome.still_present())
            .map(|r| r.fragment.as_str())
            .collect()
    }
}

/// Poll every condition of `spec` once, with `policy`.
///
/// All conditions are evaluated even when an earlier one is still present.
pub async fn check_stage(
    actions: &Actions<'_>,
    spec: &StageSpec,
    policy: &WaitPolicy,
) -> StageCheck {
    let mut reports = Vec::with_capacity(spec.conditions.len());
    for fragment in &spec.conditions {
        reports.push(await_text_gone(actions.driver(), fragment, policy).await);
    }
    StageCheck { reports }
}

/// Drives stages forward and records where the job stands
#[derive(Debug)]
pub struct ProcessingMonitor<'a> {
    actions: Actions<'a>,
    state: StageState,
}

impl<'a> ProcessingMonitor<'a> {
    /// Start in [`StageState::Idle`]
    #[must_use]
    pub const fn new(actions: Actions<'a>) -> Self {
        Self {
            actions,
            state: StageState::Idle,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &StageState {
        &self.state
    }

    /// Wait for `spec` to complete.
    ///
    /// Stages may be skipped but never revisited. Without a refresh element
    /// the stage is fail-fast; with one, the element is clicked and the
    /// conditions re-checked until the budget is spent.
    ///
    /// # Errors
    ///
    /// `StageTimedOut` when a condition is still present at the end of the
    /// budget, or when an earlier stage already timed out. `InvalidInput`
    /// when `spec` would move the monitor backwards.
    pub async fn run_stage(&mut self, spec: &StageSpec) -> ProbeResult<StageCheck> {
        if let StageState::TimedOut { stage, elapsed } = self.state {
            tracing::warn!("Skipping {} stage: {stage} stage already timed out", spec.kind);
            return Err(ProbeError::StageTimedOut {
                stage: stage.to_string(),
                elapsed,
            });
        }
        if spec.kind.order() < self.state.order() {
            return Err(ProbeError::invalid_input(format!(
                "cannot wait for {} stage from state {:?}",
                spec.kind, self.state
            )));
        }

        self.state = spec.kind.awaiting();
        let start = Instant::now();
        tracing::info!(tag = "waiting", "Waiting for {} stage...", spec.kind);

        loop {
            let remaining = spec.budget.saturating_sub(start.elapsed());
            let policy = spec.policy.with_timeout(spec.policy.timeout().min(remaining));
            let check = check_stage(&self.actions, spec, &policy).await;

            if check.all_gone() {
                self.state = spec.kind.completed();
                tracing::info!(
                    "{} stage finished in {:.2} seconds",
                    spec.kind,
                    start.elapsed().as_secs_f64()
                );
                return Ok(check);
            }

            match spec.refresh {
                Some(ref refresh) if start.elapsed() < spec.budget => {
                    tracing::info!(
                        tag = "waiting",
                        "Processing still running: {:?}",
                        check.blocking()
                    );
                    if let Err(err) = self.actions.click(refresh, "Refresh status list").await {
                        tracing::warn!("Refresh failed: {err}");
                    }
                }
                _ => {
                    let elapsed = start.elapsed();
                    tracing::error!(
                        "Timeout: {:?} still present after {:.2} seconds",
                        check.blocking(),
                        elapsed.as_secs_f64()
                    );
                    self.state = StageState::TimedOut {
                        stage: spec.kind,
                        elapsed,
                    };
                    return Err(ProbeError::StageTimedOut {
                        stage: spec.kind.to_string(),
                        elapsed,
                    });
                }
            }
        }
    }
}
