//! Clinprobe: end-to-end smoke workflow for a clinical-data web application.
//!
//! One browser session signs in, registers a test patient with exam and
//! record uploads, waits for the backend to process them, reads the
//! resulting counters, checks the overview widgets and deletes the patient
//! through the REST API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Workflow (policy table: continue / abort / retry)           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ProcessingMonitor ──► await_text_gone      extract / panels │
//! │          │                   │                    │          │
//! │          └──── Actions (fill, click, read, attach) ┘         │
//! │                        │                                     │
//! │                 locate (WaitPolicy)                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  PageDriver: CdpDriver (chromiumoxide) │ MockPage (tests)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The backend never reports completion directly. Every processing stage is
//! detected by watching transient status text until it is gone.

#![warn(missing_docs)]

mod actions;
mod browser;
mod config;
mod deletion;
pub mod dom_scripts;
mod driver;
mod extract;
mod locator;
mod lock;
mod logging;
mod panels;
mod patient;
mod poller;
mod result;
mod stages;
mod wait;
pub mod workflow;

pub use actions::{list_files, Actions, DEFAULT_SETTLE_MS};
pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::CdpDriver;
pub use config::{
    load_env_file, ProbeConfig, StartupConfig, DEFAULT_APP_URL, DEFAULT_EXAMS_DIR,
    DEFAULT_LOCK_FILE, DEFAULT_LOG_FILE, DEFAULT_RECORDS_DIR,
};
pub use deletion::{DeletionClient, API_KEY_HEADER};
pub use driver::{ClickEffect, ElementHandle, MockPage, PageDriver};
pub use extract::{
    extract_metrics, parse_count, read_chip, ChipReading, ExtractedMetrics, MetricField, LABELS,
};
pub use locator::{locate, locate_all, locate_within, LocatorKind, LocatorSpec, Readiness};
pub use lock::InstanceLock;
pub use logging::{init_logging, AppendFile, Tag, TagFormatter, TagStyle};
pub use panels::{
    check_widgets, expand_all_panels, find_empty_states, match_empty_states, PanelReport,
    WidgetReport, EMPTY_STATE_LIBRARY,
};
pub use patient::{patient_id_from_url, PatientRecord};
pub use poller::await_text_gone;
pub use result::{ProbeError, ProbeResult};
pub use stages::{check_stage, ProcessingMonitor, StageCheck, StageKind, StageSpec, StageState};
pub use wait::{
    PollOutcome, PollReport, WaitPolicy, DEFAULT_LOCATOR_POLL_MS, DEFAULT_LOCATOR_TIMEOUT_MS,
    DEFAULT_STAGE_TIMEOUT_MS, DEFAULT_TEXT_POLL_MS,
};
pub use workflow::{
    ActionKind, ActionOutcome, ActionOutput, ActionReport, ExamSummary, FailurePolicy,
    PolicyTable, RunReport, Verdict, Workflow, WorkflowTiming,
};
