//! Failure policies and run reports.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::extract::ExtractedMetrics;
use crate::panels::WidgetReport;
use crate::patient::PatientRecord;

/// Top-level workflow actions, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Sign in
    Login,
    /// Create the test patient and upload files
    RegisterPatient,
    /// Wait for uploads and ingestion
    AwaitProcessing,
    /// Wait for exam processing and read its results
    CheckExams,
    /// Open the overview and look for empty widgets
    CheckWidgets,
    /// Remove the test patient through the API
    DeletePatient,
    /// Close the browser
    Logout,
}

impl ActionKind {
    /// Run order
    pub const SEQUENCE: [Self; 7] = [
        Self::Login,
        Self::RegisterPatient,
        Self::AwaitProcessing,
        Self::CheckExams,
        Self::CheckWidgets,
        Self::DeletePatient,
        Self::Logout,
    ];

    /// Runs even after an abort
    #[must_use]
    pub const fn is_teardown(self) -> bool {
        matches!(self, Self::Logout)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "Login",
            Self::RegisterPatient => "Register patient",
            Self::AwaitProcessing => "Await processing",
            Self::CheckExams => "Check exams",
            Self::CheckWidgets => "Check widgets",
            Self::DeletePatient => "Delete patient",
            Self::Logout => "Logout",
        })
    }
}

/// What the runner does after an action fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Move on to the next action
    #[default]
    Continue,
    /// Skip everything up to teardown
    Abort,
    /// Try again up to `retries` more times, then continue
    Retry {
        /// Extra attempts
        retries: u32,
    },
}

impl FailurePolicy {
    /// Total attempts allowed
    #[must_use]
    pub const fn attempts(self) -> u32 {
        match self {
            Self::Retry { retries } => retries.saturating_add(1),
            Self::Continue | Self::Abort => 1,
        }
    }
}

/// Failure policy per action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    policies: HashMap<ActionKind, FailurePolicy>,
}

impl Default for PolicyTable {
    /// Login aborts, everything else continues
    fn default() -> Self {
        Self::new().with(ActionKind::Login, FailurePolicy::Abort)
    }
}

impl PolicyTable {
    /// Table where every action continues
    #[must_use]
    pub fn new() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    /// Set the policy for `action`
    #[must_use]
    pub fn with(mut self, action: ActionKind, policy: FailurePolicy) -> Self {
        self.policies.insert(action, policy);
        self
    }

    /// Policy for `action`
    #[must_use]
    pub fn get(&self, action: ActionKind) -> FailurePolicy {
        self.policies.get(&action).copied().unwrap_or_default()
    }
}

/// Figures reported on the sent-exams screen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamSummary {
    /// Measurements found in the exam files
    pub measurements: Option<String>,
    /// Error count line
    pub errors: Option<String>,
}

/// Data produced by a successful action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutput {
    /// Nothing to report
    Done,
    /// Patient created
    Patient(PatientRecord),
    /// Chip counters after ingestion
    Metrics(ExtractedMetrics),
    /// Exam processing results
    Exams {
        /// Sent-exams figures
        summary: ExamSummary,
        /// Chip counters on the exams screen
        metrics: ExtractedMetrics,
    },
    /// Widget check results
    Widgets(WidgetReport),
    /// Patient removed
    Deleted {
        /// Deleted id
        patient_id: String,
    },
}

/// How one action ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    /// Finished without error
    Succeeded(ActionOutput),
    /// Every attempt failed
    Failed {
        /// Last error
        error: String,
    },
    /// Not attempted because an earlier action aborted the run
    Skipped,
}

/// Result of one top-level action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    /// Which action
    pub action: ActionKind,
    /// How it ended
    pub outcome: ActionOutcome,
    /// Attempts made
    pub attempts: u32,
    /// Time spent across attempts
    pub elapsed: Duration,
}

impl ActionReport {
    /// Report for an action that never ran
    #[must_use]
    pub const fn skipped(action: ActionKind) -> Self {
        Self {
            action,
            outcome: ActionOutcome::Skipped,
            attempts: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Whether the action failed
    #[must_use]
    pub const fn failed(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Failed { .. })
    }
}

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Every executed action succeeded
    Passed,
    /// At least one action failed
    Failed,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
        })
    }
}

/// Every action report of a run, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Reports in run order
    pub actions: Vec<ActionReport>,
}

impl RunReport {
    /// `Passed` when no executed action failed
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        if self.actions.iter().any(ActionReport::failed) {
            Verdict::Failed
        } else {
            Verdict::Passed
        }
    }

    /// Report for `action`, if it was recorded
    #[must_use]
    pub fn get(&self, action: ActionKind) -> Option<&ActionReport> {
        self.actions.iter().find(|r| r.action == action)
    }

    /// Total time across actions
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.actions.iter().map(|r| r.elapsed).sum()
    }
}
