//! End-to-end smoke workflow.
//!
//! Seven top-level actions run in order against one page: login, patient
//! registration with uploads, processing waits, the exams check, the widget
//! check, API cleanup and logout. Each action returns a `Result`; the
//! [`PolicyTable`] decides whether a failure continues the run, aborts it or
//! is retried. Logout runs on every path so the browser is always closed.

pub mod policy;
#[allow(missing_docs)]
pub mod ui;

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::actions::Actions;
use crate::config::ProbeConfig;
use crate::deletion::DeletionClient;
use crate::extract::{extract_metrics, DEFAULT_RENDER_DELAY_MS};
use crate::panels::{check_widgets, DEFAULT_EXPAND_TIMEOUT_MS};
use crate::patient::PatientRecord;
use crate::poller::await_text_gone;
use crate::result::{ProbeError, ProbeResult};
use crate::stages::{ProcessingMonitor, StageKind, StageSpec};
use crate::wait::WaitPolicy;

pub use policy::{
    ActionKind, ActionOutcome, ActionOutput, ActionReport, ExamSummary, FailurePolicy,
    PolicyTable, RunReport, Verdict,
};

/// Fixed pauses between UI steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowTiming {
    /// Before each top-level action
    pub step_pause: Duration,
    /// After navigation-like clicks (tab changes, dialog saves)
    pub transition_pause: Duration,
    /// Before chips are read
    pub render_delay: Duration,
    /// Bound on one panel opening
    pub expand_timeout: Duration,
}

impl Default for WorkflowTiming {
    fn default() -> Self {
        Self {
            step_pause: Duration::from_secs(5),
            transition_pause: Duration::from_secs(2),
            render_delay: Duration::from_millis(DEFAULT_RENDER_DELAY_MS),
            expand_timeout: Duration::from_millis(DEFAULT_EXPAND_TIMEOUT_MS),
        }
    }
}

/// One run of the smoke workflow
#[derive(Debug)]
pub struct Workflow<'a> {
    actions: Actions<'a>,
    config: ProbeConfig,
    timing: WorkflowTiming,
    policies: PolicyTable,
    monitor: ProcessingMonitor<'a>,
    patient: PatientRecord,
}

impl<'a> Workflow<'a> {
    /// Workflow with default timing and policies
    #[must_use]
    pub fn new(actions: Actions<'a>, config: ProbeConfig) -> Self {
        Self {
            actions,
            config,
            timing: WorkflowTiming::default(),
            policies: PolicyTable::default(),
            monitor: ProcessingMonitor::new(actions),
            patient: PatientRecord::test_patient(),
        }
    }

    /// Override pauses
    #[must_use]
    pub const fn with_timing(mut self, timing: WorkflowTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Override failure policies
    #[must_use]
    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }

    /// Patient as known so far
    #[must_use]
    pub const fn patient(&self) -> &PatientRecord {
        &self.patient
    }

    /// Run every action and report.
    ///
    /// Logout runs even when an earlier action aborted the run.
    pub async fn run(&mut self) -> RunReport {
        let mut report = RunReport::default();
        let mut aborted = false;

        for action in ActionKind::SEQUENCE {
            if aborted && !action.is_teardown() {
                tracing::warn!("Skipping '{action}' after an earlier abort");
                report.actions.push(ActionReport::skipped(action));
                continue;
            }

            let result = self.execute(action).await;
            if result.failed() && self.policies.get(action) == FailurePolicy::Abort {
                tracing::error!("'{action}' failed, skipping to logout");
                aborted = true;
            }
            report.actions.push(result);
        }

        let verdict = report.verdict();
        let secs = report.elapsed().as_secs_f64();
        if verdict == Verdict::Passed {
            tracing::info!(tag = "ok", "Run {verdict} in {secs:.2} seconds");
        } else {
            tracing::error!("Run {verdict} in {secs:.2} seconds");
        }
        report
    }

    /// Run one action under its failure policy
    pub async fn execute(&mut self, action: ActionKind) -> ActionReport {
        let allowed = self.policies.get(action).attempts();
        let start = Instant::now();
        let mut attempts = 0;

        let outcome = loop {
            attempts += 1;
            tracing::info!(tag = "starting", "Starting '{action}'");
            match self.step(action).await {
                Ok(output) => break ActionOutcome::Succeeded(output),
                Err(err) => {
                    tracing::error!(
                        "'{action}' failed after {:.2} seconds: {err}",
                        start.elapsed().as_secs_f64()
                    );
                    if attempts >= allowed {
                        break ActionOutcome::Failed {
                            error: err.to_string(),
                        };
                    }
                    tracing::warn!("Retrying '{action}' ({attempts}/{allowed})");
                }
            }
        };

        let elapsed = start.elapsed();
        tracing::info!(
            tag = "waiting",
            "Action '{action}' finished in {:.2} seconds",
            elapsed.as_secs_f64()
        );
        ActionReport {
            action,
            outcome,
            attempts,
            elapsed,
        }
    }

    async fn step(&mut self, action: ActionKind) -> ProbeResult<ActionOutput> {
        if !action.is_teardown() {
            sleep(self.timing.step_pause).await;
        }
        match action {
            ActionKind::Login => self.login().await,
            ActionKind::RegisterPatient => self.register_patient().await,
            ActionKind::AwaitProcessing => self.await_processing().await,
            ActionKind::CheckExams => self.check_exams().await,
            ActionKind::CheckWidgets => self.check_widgets().await,
            ActionKind::DeletePatient => self.delete_patient().await,
            ActionKind::Logout => self.logout().await,
        }
    }

    fn stage_policy(&self, timeout: Duration) -> ProbeResult<WaitPolicy> {
        WaitPolicy::new(timeout, self.config.poll_interval)
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    async fn login(&mut self) -> ProbeResult<ActionOutput> {
        let a = self.actions;
        tracing::info!("Logging in...");
        a.driver().navigate(&self.config.app_url).await?;

        a.click(&ui::access_button(), "Click access").await?;
        sleep(self.timing.step_pause).await;
        a.fill(&ui::email_field(), self.config.email.as_deref(), "Fill email")
            .await?;
        a.fill(&ui::password_field(), self.config.password.as_deref(), "Fill password")
            .await?;
        a.click(&ui::submit_login(), "Click sign in").await?;

        let policy = self.stage_policy(self.config.stage_timeout)?;
        let report = await_text_gone(a.driver(), ui::LOGIN_PENDING, &policy).await;
        if report.outcome.still_present() {
            return Err(ProbeError::StageTimedOut {
                stage: "login".to_string(),
                elapsed: report.elapsed,
            });
        }
        tracing::info!(tag = "ok", "Logged in");
        Ok(ActionOutput::Done)
    }

    async fn register_patient(&mut self) -> ProbeResult<ActionOutput> {
        let a = self.actions;
        let patient = PatientRecord::test_patient();
        tracing::info!("Registering patient '{}'...", patient.name);

        a.click(&ui::new_patient_button(), "Click new patient").await?;
        a.fill(&ui::name_field(), Some(patient.name.as_str()), "Fill name").await?;
        a.fill(&ui::birthdate_field(), Some(patient.birthdate.as_str()), "Fill birthdate")
            .await?;
        a.click(&ui::gender_select(), "Open gender select").await?;
        a.click(&ui::gender_option(&patient.gender), "Select gender")
            .await?;
        a.click(&ui::save_patient(), "Click save").await?;
        sleep(self.timing.step_pause).await;

        a.click(&ui::add_files_button(), "Click add exams and records")
            .await?;
        a.click(&ui::send_exams_button(), "Click send exams").await?;
        a.attach_files(&ui::file_input(), &self.config.exams_dir, "Select exams")
            .await?;
        a.click(&ui::send_records_button(), "Click send records").await?;
        a.attach_files(&ui::file_input(), &self.config.records_dir, "Select records")
            .await?;
        sleep(self.timing.transition_pause).await;
        a.click(&ui::save_uploads(), "Click save uploads").await?;

        self.patient = patient;
        let url = a.driver().current_url().await?;
        if self.patient.capture_id(&url) {
            let id = self.patient.id.as_deref().unwrap_or_default();
            tracing::info!(tag = "ok", "Patient registered with id {id}");
        } else {
            tracing::warn!("Patient id not found in '{url}' yet");
        }
        Ok(ActionOutput::Patient(self.patient.clone()))
    }

    async fn await_processing(&mut self) -> ProbeResult<ActionOutput> {
        let a = self.actions;
        tracing::info!(tag = "waiting", "Waiting for processing...");

        let upload = StageSpec::new(
            StageKind::UploadAck,
            [ui::UPLOADING],
            self.stage_policy(self.config.stage_timeout)?,
        );
        self.monitor.run_stage(&upload).await?;

        sleep(self.timing.transition_pause).await;
        a.click(&ui::records_tab(), "Click records").await?;
        sleep(self.timing.transition_pause).await;

        let ingestion = StageSpec::new(
            StageKind::Ingestion,
            [ui::AWAITING_PROCESSING, ui::PROCESSING],
            self.stage_policy(self.config.stage_timeout)?,
        );
        self.monitor.run_stage(&ingestion).await?;

        let metrics = extract_metrics(a.driver(), self.timing.render_delay).await;
        Ok(ActionOutput::Metrics(metrics))
    }

    async fn check_exams(&mut self) -> ProbeResult<ActionOutput> {
        let a = self.actions;
        tracing::info!(tag = "checking", "Checking exam processing...");

        a.click(&ui::exams_tab(), "Click exams").await?;
        a.click(&ui::sent_exams_link(), "Click sent exams").await?;
        sleep(self.timing.transition_pause).await;

        let round = self.config.refresh_round.min(self.config.stage_timeout);
        let per_file = StageSpec::new(
            StageKind::PerFileProcessing,
            [ui::AWAITING_PROCESSING, ui::EXAM_AWAITING_PROCESSING],
            self.stage_policy(round)?,
        )
        .with_refresh(ui::refresh_sent_exams(), self.config.stage_timeout);
        self.monitor.run_stage(&per_file).await?;

        let summary = ExamSummary {
            measurements: a
                .read_number(&ui::exam_measurements(), "Read measurements")
                .await
                .ok()
                .flatten(),
            errors: a
                .read_number(&ui::exam_errors(), "Read errors")
                .await
                .ok()
                .flatten(),
        };
        tracing::info!(
            tag = "data",
            "Sent exam files: {} measurements, {}",
            summary.measurements.as_deref().unwrap_or("?"),
            summary.errors.as_deref().unwrap_or("no error count")
        );

        a.click(&ui::exams_tab(), "Click exams").await?;
        let metrics = extract_metrics(a.driver(), self.timing.render_delay).await;
        Ok(ActionOutput::Exams { summary, metrics })
    }

    async fn check_widgets(&mut self) -> ProbeResult<ActionOutput> {
        let a = self.actions;
        tracing::info!(tag = "checking", "Checking widgets...");

        a.click(&ui::overview_tab(), "Click overview").await?;
        sleep(self.timing.step_pause).await;

        let report = check_widgets(&a, self.timing.expand_timeout).await?;
        Ok(ActionOutput::Widgets(report))
    }

    async fn delete_patient(&mut self) -> ProbeResult<ActionOutput> {
        if self.patient.id.is_none() {
            let url = self.actions.driver().current_url().await?;
            self.patient.capture_id(&url);
        }
        let patient_id = self
            .patient
            .id
            .clone()
            .ok_or_else(|| ProbeError::invalid_input("patient id not found in the page URL"))?;

        let api_url = self.config.require_api_url()?;
        let client = DeletionClient::new(api_url, self.config.api_key.clone());
        client.delete_patient(&patient_id).await?;
        Ok(ActionOutput::Deleted { patient_id })
    }

    async fn logout(&mut self) -> ProbeResult<ActionOutput> {
        self.actions.driver().close().await?;
        tracing::info!("Session closed");
        Ok(ActionOutput::Done)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{ClickEffect, ElementHandle, MockPage};
    use crate::locator::LocatorSpec;
    use crate::panels::CARD_TEXT_XPATH;

    fn fast_timing() -> WorkflowTiming {
        WorkflowTiming {
            step_pause: Duration::from_millis(10),
            transition_pause: Duration::from_millis(10),
            render_delay: Duration::from_millis(10),
            expand_timeout: Duration::from_secs(1),
        }
    }

    fn actions(page: &MockPage) -> Actions<'_> {
        Actions::new(page)
            .with_policy(
                WaitPolicy::new(Duration::from_secs(1), Duration::from_millis(100)).unwrap(),
            )
            .with_settle(Duration::from_millis(10))
    }

    struct Fixture {
        _exams: tempfile::TempDir,
        _records: tempfile::TempDir,
        config: ProbeConfig,
    }

    fn fixture(api_url: Option<String>) -> Fixture {
        let exams = tempfile::tempdir().unwrap();
        std::fs::write(exams.path().join("exame.pdf"), b"%PDF").unwrap();
        let records = tempfile::tempdir().unwrap();
        std::fs::write(records.path().join("prontuario.txt"), b"txt").unwrap();

        let config = ProbeConfig {
            email: Some("qa@example.com".into()),
            password: Some("secret".into()),
            api_url,
            api_key: Some("k123".into()),
            exams_dir: exams.path().to_path_buf(),
            records_dir: records.path().to_path_buf(),
            stage_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
            refresh_round: Duration::from_secs(10),
            ..ProbeConfig::default()
        };
        Fixture {
            _exams: exams,
            _records: records,
            config,
        }
    }

    fn add(page: &MockPage, locator: LocatorSpec, id: &str) {
        page.add_element(locator, ElementHandle::new(id, "button"));
    }

    /// Page exposing every element the happy path touches
    fn scripted_app(page: &MockPage) {
        add(page, ui::access_button(), "access");
        add(page, ui::email_field(), "email");
        add(page, ui::password_field(), "password");
        add(page, ui::submit_login(), "next");
        add(page, ui::new_patient_button(), "new-patient");
        add(page, ui::name_field(), "name");
        add(page, ui::birthdate_field(), "birthdate");
        add(page, ui::gender_select(), "gender");
        add(page, ui::gender_option("Feminino"), "feminino");
        add(page, ui::save_patient(), "save-patient");
        add(page, ui::add_files_button(), "add-files");
        add(page, ui::send_exams_button(), "send-exams");
        add(page, ui::send_records_button(), "send-records");
        page.add_element(
            ui::file_input(),
            ElementHandle::new("file-input", "input").with_visible(false),
        );
        add(page, ui::save_uploads(), "save-uploads");
        add(page, ui::records_tab(), "records-tab");
        add(page, ui::exams_tab(), "exams-tab");
        add(page, ui::sent_exams_link(), "sent-exams");
        add(page, ui::refresh_sent_exams(), "refresh");
        add(page, ui::overview_tab(), "overview");
        page.add_element(
            ui::exam_measurements(),
            ElementHandle::new("measurements", "span").with_text("12"),
        );
        page.add_element(
            ui::exam_errors(),
            ElementHandle::new("errors", "p").with_text("0 Erros"),
        );
        page.add_element(
            LocatorSpec::xpath(CARD_TEXT_XPATH),
            ElementHandle::new("card", "p").with_text("Nenhum procedimento."),
        );
        page.on_click(
            "save-uploads",
            ClickEffect::Navigate("https://app.example.com/patient/42/records".into()),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_failure_aborts_but_still_closes_browser() {
        let fx = fixture(None);
        let page = MockPage::new();
        let mut workflow =
            Workflow::new(actions(&page), fx.config.clone()).with_timing(fast_timing());

        let report = workflow.run().await;

        assert_eq!(report.verdict(), Verdict::Failed);
        assert!(report.get(ActionKind::Login).unwrap().failed());
        for skipped in [
            ActionKind::RegisterPatient,
            ActionKind::AwaitProcessing,
            ActionKind::CheckExams,
            ActionKind::CheckWidgets,
            ActionKind::DeletePatient,
        ] {
            assert_eq!(report.get(skipped).unwrap().outcome, ActionOutcome::Skipped);
        }
        assert!(matches!(
            report.get(ActionKind::Logout).unwrap().outcome,
            ActionOutcome::Succeeded(_)
        ));
        assert!(page.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_password_fails_login() {
        let mut fx = fixture(None);
        fx.config.password = None;
        let page = MockPage::new();
        scripted_app(&page);
        let mut workflow =
            Workflow::new(actions(&page), fx.config.clone()).with_timing(fast_timing());

        let report = workflow.execute(ActionKind::Login).await;

        assert!(matches!(
            report.outcome,
            ActionOutcome::Failed { ref error } if error.contains("Invalid input")
        ));
        assert_eq!(page.value_of("email").as_deref(), Some("qa@example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_waits_for_pending_message() {
        let fx = fixture(None);
        let page = MockPage::new();
        scripted_app(&page);
        page.show_text_for(ui::LOGIN_PENDING, Duration::from_secs(30));
        let mut workflow =
            Workflow::new(actions(&page), fx.config.clone()).with_timing(fast_timing());

        let report = workflow.execute(ActionKind::Login).await;

        assert!(matches!(report.outcome, ActionOutcome::Succeeded(ActionOutput::Done)));
        assert!(report.elapsed >= Duration::from_secs(30));
        assert!(page.was_called("navigate:https://staging.voiston.ai"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_uploads_and_captures_id() {
        let fx = fixture(None);
        let page = MockPage::new();
        scripted_app(&page);
        let mut workflow =
            Workflow::new(actions(&page), fx.config.clone()).with_timing(fast_timing());

        let report = workflow.execute(ActionKind::RegisterPatient).await;

        assert!(matches!(report.outcome, ActionOutcome::Succeeded(ActionOutput::Patient(_))));
        assert_eq!(workflow.patient().id.as_deref(), Some("42"));
        assert_eq!(page.value_of("name").as_deref(), Some("Teste Automatizado"));
        assert_eq!(page.value_of("birthdate").as_deref(), Some("20051995"));
        let files = page.files_of("file-input");
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("prontuario.txt"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_timeout_skips_later_stages() {
        let fx = fixture(None);
        let page = MockPage::new();
        scripted_app(&page);
        page.show_text("Processando: exame.pdf");
        let mut workflow =
            Workflow::new(actions(&page), fx.config.clone()).with_timing(fast_timing());

        let processing = workflow.execute(ActionKind::AwaitProcessing).await;
        assert!(processing.failed());

        let start = Instant::now();
        let exams = workflow.execute(ActionKind::CheckExams).await;
        assert!(matches!(
            exams.outcome,
            ActionOutcome::Failed { ref error } if error.contains("ingestion")
        ));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(!page.was_called("click:refresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_without_api_url_fails_once() {
        let fx = fixture(None);
        let page = MockPage::new();
        page.set_url("https://app.example.com/patient/42/overview");
        let mut workflow =
            Workflow::new(actions(&page), fx.config.clone()).with_timing(fast_timing());

        let report = workflow.execute(ActionKind::DeletePatient).await;

        assert_eq!(report.attempts, 1);
        assert!(matches!(
            report.outcome,
            ActionOutcome::Failed { ref error } if error.contains("URL_API")
        ));
        assert_eq!(workflow.patient().id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_rejected_delete_is_sent_once() {
        use axum::http::StatusCode;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);
        let app = axum::Router::new().route(
            "/patients/{id}",
            axum::routing::delete(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::NOT_FOUND, "patient not found")
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let fx = fixture(Some(format!("http://{addr}/patients/")));
        let page = MockPage::new();
        page.set_url("https://app.example.com/patient/42/overview");
        let mut workflow =
            Workflow::new(actions(&page), fx.config.clone()).with_timing(fast_timing());

        let report = workflow.execute(ActionKind::DeletePatient).await;

        assert!(matches!(
            report.outcome,
            ActionOutcome::Failed { ref error } if error.contains("404")
        ));
        assert_eq!(report.attempts, 1);
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_without_patient_id() {
        let fx = fixture(Some("http://127.0.0.1:9/patients/".into()));
        let page = MockPage::new();
        let mut workflow = Workflow::new(actions(&page), fx.config.clone())
            .with_timing(fast_timing())
            .with_policies(PolicyTable::new());

        let report = workflow.execute(ActionKind::DeletePatient).await;

        assert_eq!(report.attempts, 1);
        assert!(report.failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path_without_cleanup_endpoint() {
        let fx = fixture(None);
        let page = MockPage::new();
        scripted_app(&page);
        page.show_text_for(ui::UPLOADING, Duration::from_secs(8));
        page.show_text(ui::EXAM_AWAITING_PROCESSING);
        page.on_click("refresh", ClickEffect::HideText(ui::EXAM_AWAITING_PROCESSING.into()));
        let mut workflow =
            Workflow::new(actions(&page), fx.config.clone()).with_timing(fast_timing());

        let report = workflow.run().await;

        for action in [
            ActionKind::Login,
            ActionKind::RegisterPatient,
            ActionKind::AwaitProcessing,
            ActionKind::CheckExams,
            ActionKind::CheckWidgets,
            ActionKind::Logout,
        ] {
            let r = report.get(action).unwrap();
            assert!(matches!(r.outcome, ActionOutcome::Succeeded(_)), "{action}: {:?}", r.outcome);
        }

        match &report.get(ActionKind::CheckExams).unwrap().outcome {
            ActionOutcome::Succeeded(ActionOutput::Exams { summary, .. }) => {
                assert_eq!(summary.measurements.as_deref(), Some("12"));
                assert_eq!(summary.errors.as_deref(), Some("0 Erros"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        match &report.get(ActionKind::CheckWidgets).unwrap().outcome {
            ActionOutcome::Succeeded(ActionOutput::Widgets(widgets)) => {
                assert_eq!(widgets.empty_states, vec!["Nenhum procedimento."]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        assert!(report.get(ActionKind::DeletePatient).unwrap().failed());
        assert_eq!(report.verdict(), Verdict::Failed);
        assert!(page.is_closed());
    }
}
