//! Text-presence poller.
//!
//! The backend never announces that a job finished; the only signal is
//! transient status text ("Enviando arquivos...", "Processando: ...") that the
//! frontend renders while work is pending. [`await_text_gone`] watches one such
//! fragment until it is no longer rendered or the policy runs out.

use tokio::time::{sleep, Instant};

use crate::driver::PageDriver;
use crate::wait::{PollOutcome, PollReport, WaitPolicy};

/// Wait until no element's text contains `fragment`.
///
/// One query per poll tick:
///
/// - no match: [`PollOutcome::Disappeared`] right away
/// - query fault: logged, [`PollOutcome::Error`] (callers treat it as gone)
/// - timeout reached: [`PollOutcome::StillPresent`]
///
/// Returns in `[timeout, timeout + poll_interval)` when the text stays. Only
/// the state at each tick is observed; text that vanishes and comes back
/// between two ticks goes unnoticed.
pub async fn await_text_gone(
    driver: &dyn PageDriver,
    fragment: &str,
    policy: &WaitPolicy,
) -> PollReport {
    let start = Instant::now();
    let mut polls = 0_u32;
    tracing::info!(tag = "checking", "Checking for text '{fragment}'");

    let outcome = loop {
        polls += 1;
        match driver.text_present(fragment).await {
            Ok(false) => {
                tracing::info!("Text '{fragment}' is gone from the page");
                break PollOutcome::Disappeared;
            }
            Ok(true) => {}
            Err(err) => {
                tracing::error!("Failed to check for '{fragment}': {err}");
                break PollOutcome::Error(err.to_string());
            }
        }

        if start.elapsed() >= policy.timeout() {
            tracing::warn!(
                tag = "waiting",
                "Timeout reached, text '{fragment}' is still on the page"
            );
            break PollOutcome::StillPresent;
        }

        sleep(policy.poll_interval()).await;
    };

    PollReport {
        fragment: fragment.to_string(),
        outcome,
        elapsed: start.elapsed(),
        polls,
    }
}
