//! End-of-run summary on stderr

use clinprobe::{ActionOutcome, ActionOutput, ActionReport, RunReport, Verdict};
use console::{style, Term};

/// One summary line per action plus the verdict
#[must_use]
pub fn summary_lines(report: &RunReport) -> Vec<String> {
    let mut lines: Vec<String> = report.actions.iter().map(action_line).collect();
    let verdict = report.verdict();
    let label = match verdict {
        Verdict::Passed => style(verdict.to_string()).green().bold().for_stderr(),
        Verdict::Failed => style(verdict.to_string()).red().bold().for_stderr(),
    };
    lines.push(format!(
        "{label} in {:.2}s",
        report.elapsed().as_secs_f64()
    ));
    lines
}

fn action_line(report: &ActionReport) -> String {
    let name = format!("{:<18}", report.action.to_string());
    match &report.outcome {
        ActionOutcome::Succeeded(output) => format!(
            "{} {name} {:>7.2}s{}",
            style("ok  ").green().for_stderr(),
            report.elapsed.as_secs_f64(),
            detail(output)
        ),
        ActionOutcome::Failed { error } => format!(
            "{} {name} {:>7.2}s  {error} ({} attempt{})",
            style("FAIL").red().for_stderr(),
            report.elapsed.as_secs_f64(),
            report.attempts,
            if report.attempts == 1 { "" } else { "s" }
        ),
        ActionOutcome::Skipped => format!("{} {name}", style("skip").dim().for_stderr()),
    }
}

fn detail(output: &ActionOutput) -> String {
    match output {
        ActionOutput::Done => String::new(),
        ActionOutput::Patient(patient) => match patient.id {
            Some(ref id) => format!("  patient {id}"),
            None => "  patient id unknown".to_string(),
        },
        ActionOutput::Metrics(metrics) => format!("  {metrics}"),
        ActionOutput::Exams { metrics, .. } => format!("  {metrics}"),
        ActionOutput::Widgets(widgets) => format!(
            "  {} panels, {} empty",
            widgets.panels.total(),
            widgets.empty_states.len()
        ),
        ActionOutput::Deleted { patient_id } => format!("  patient {patient_id}"),
    }
}

/// Write the summary to stderr
pub fn print_summary(report: &RunReport) {
    let term = Term::stderr();
    for line in summary_lines(report) {
        let _ = term.write_line(&line);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clinprobe::ActionKind;
    use std::time::Duration;

    fn report(action: ActionKind, outcome: ActionOutcome, attempts: u32) -> ActionReport {
        ActionReport {
            action,
            outcome,
            attempts,
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_passed_summary() {
        let run = RunReport {
            actions: vec![
                report(ActionKind::Login, ActionOutcome::Succeeded(ActionOutput::Done), 1),
                report(
                    ActionKind::DeletePatient,
                    ActionOutcome::Succeeded(ActionOutput::Deleted {
                        patient_id: "42".into(),
                    }),
                    1,
                ),
            ],
        };
        let lines = summary_lines(&run);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Login"));
        assert!(lines[1].contains("patient 42"));
        assert!(lines[2].contains("PASSED"));
        assert!(lines[2].contains("3.00s"));
    }

    #[test]
    fn test_failed_summary_counts_attempts() {
        let run = RunReport {
            actions: vec![
                report(
                    ActionKind::DeletePatient,
                    ActionOutcome::Failed {
                        error: "Missing configuration: URL_API".into(),
                    },
                    2,
                ),
                ActionReport::skipped(ActionKind::CheckWidgets),
            ],
        };
        let lines = summary_lines(&run);
        assert!(lines[0].contains("FAIL"));
        assert!(lines[0].contains("URL_API"));
        assert!(lines[0].contains("2 attempts"));
        assert!(lines[1].contains("skip"));
        assert!(lines[2].contains("FAILED"));
    }
}
