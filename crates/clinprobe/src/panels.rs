//! Expansion panels and the widget empty-state scan.
//!
//! Collapsed panels do not keep their content in the DOM, so every panel is
//! opened before card texts are read.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};

use crate::actions::Actions;
use crate::locator::LocatorSpec;
use crate::result::{ProbeError, ProbeResult};

/// Tag of the panel headers
pub const PANEL_HEADER_TAG: &str = "mat-expansion-panel-header";

/// Paragraphs inside widget cards
pub const CARD_TEXT_XPATH: &str = "//mat-card-content//p";

/// Bound on waiting for one header to report itself expanded
pub const DEFAULT_EXPAND_TIMEOUT_MS: u64 = 5_000;

/// Messages a widget shows when it has nothing to display
pub const EMPTY_STATE_LIBRARY: [&str; 10] = [
    "Esse paciente não possui um histórico de acompanhamento.",
    "Não há medidas a serem exibidas",
    "Nenhuma prescrição de medicamento",
    "Não identificamos palavras-chaves para esse paciente.",
    "Nenhum procedimento.",
    "Nenhuma prescrição de óculos",
    "Nenhuma refração dinâmica",
    "Nenhuma refração estática",
    "Nenhum exame de auto-refrator",
    "Nenhum exame de auto-tonômetro",
];

/// Counts from one panel-expansion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelReport {
    /// Panels that were open already
    pub already_open: usize,
    /// Panels this pass opened
    pub expanded: usize,
}

impl PanelReport {
    /// Total panels seen
    #[must_use]
    pub const fn total(&self) -> usize {
        self.already_open + self.expanded
    }
}

/// Outcome of the widget check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetReport {
    /// Panel expansion counts
    pub panels: PanelReport,
    /// Empty-state messages found, in page order
    pub empty_states: Vec<String>,
}

fn header_locator() -> LocatorSpec {
    LocatorSpec::css(PANEL_HEADER_TAG)
}

/// Open every collapsed expansion panel on the page.
///
/// Each click is followed by a bounded wait for `aria-expanded="true"`.
///
/// # Errors
///
/// Driver errors, or `LocatorTimeout` when a header does not report itself
/// expanded within `expand_timeout`.
pub async fn expand_all_panels(
    actions: &Actions<'_>,
    expand_timeout: Duration,
) -> ProbeResult<PanelReport> {
    let driver = actions.driver();
    let headers = driver.query_all(&header_locator()).await?;
    let mut report = PanelReport::default();

    for header in &headers {
        if driver.attribute(header, "aria-expanded").await?.as_deref() != Some("false") {
            tracing::info!(tag = "ok", "Panel already open");
            report.already_open += 1;
            continue;
        }

        tracing::info!("Panel collapsed, expanding it now...");
        driver.click(header).await?;

        let start = Instant::now();
        while driver.attribute(header, "aria-expanded").await?.as_deref() != Some("true") {
            if start.elapsed() >= expand_timeout {
                return Err(ProbeError::LocatorTimeout {
                    locator: format!("{PANEL_HEADER_TAG}#{}[aria-expanded=true]", header.id),
                    waited: start.elapsed(),
                });
            }
            sleep(actions.policy().poll_interval()).await;
        }
        report.expanded += 1;
    }

    Ok(report)
}

/// Known empty-state messages among `texts`, deduplicated, first occurrence order
#[must_use]
pub fn match_empty_states<I, S>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    texts
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| EMPTY_STATE_LIBRARY.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Read widget card texts and return the empty-state messages among them
///
/// # Errors
///
/// Locator errors when no card text appears
pub async fn find_empty_states(actions: &Actions<'_>) -> ProbeResult<Vec<String>> {
    let texts = actions
        .read_text_set(&LocatorSpec::xpath(CARD_TEXT_XPATH), "Read widget texts")
        .await?;
    Ok(match_empty_states(texts))
}

/// Expand all panels, then scan the cards for empty states
///
/// # Errors
///
/// Errors from [`expand_all_panels`] or [`find_empty_states`]
pub async fn check_widgets(
    actions: &Actions<'_>,
    expand_timeout: Duration,
) -> ProbeResult<WidgetReport> {
    let panels = expand_all_panels(actions, expand_timeout).await?;
    let empty_states = find_empty_states(actions).await?;
    if empty_states.is_empty() {
        tracing::info!(tag = "ok", "Every widget has content");
    } else {
        tracing::warn!("Widgets without data: {}", empty_states.join("; "));
    }
    Ok(WidgetReport {
        panels,
        empty_states,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{ClickEffect, ElementHandle, MockPage, PageDriver};
    use crate::wait::WaitPolicy;

    fn actions(page: &MockPage) -> Actions<'_> {
        Actions::new(page)
            .with_policy(
                WaitPolicy::new(Duration::from_secs(1), Duration::from_millis(100)).unwrap(),
            )
            .with_settle(Duration::from_millis(10))
    }

    fn panel(page: &MockPage, id: &str, expanded: bool, opens_on_click: bool) {
        page.add_element(header_locator(), ElementHandle::new(id, PANEL_HEADER_TAG));
        page.set_attribute(id, "aria-expanded", expanded.to_string());
        if opens_on_click {
            page.on_click(
                id,
                ClickEffect::SetAttribute {
                    element: id.to_string(),
                    name: "aria-expanded".to_string(),
                    value: "true".to_string(),
                },
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_panels_end_expanded() {
        let page = MockPage::new();
        panel(&page, "p1", false, true);
        panel(&page, "p2", true, true);
        panel(&page, "p3", false, true);

        let report = expand_all_panels(&actions(&page), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(report, PanelReport { already_open: 1, expanded: 2 });
        for header in page.query_all(&header_locator()).await.unwrap() {
            let state = page.attribute(&header, "aria-expanded").await.unwrap();
            assert_eq!(state.as_deref(), Some("true"));
        }
        assert!(!page.was_called("click:p2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_panel_times_out() {
        let page = MockPage::new();
        panel(&page, "p1", false, false);

        let err = expand_all_panels(&actions(&page), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::LocatorTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_panels() {
        let page = MockPage::new();
        let report = expand_all_panels(&actions(&page), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_match_empty_states_dedups_in_order() {
        let found = match_empty_states([
            "Nenhum procedimento.",
            "12 medidas",
            " Nenhuma refração estática ",
            "Nenhum procedimento.",
        ]);
        assert_eq!(found, vec!["Nenhum procedimento.", "Nenhuma refração estática"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_widgets() {
        let page = MockPage::new();
        panel(&page, "p1", false, true);
        let texts = LocatorSpec::xpath(CARD_TEXT_XPATH);
        page.add_element(
            texts.clone(),
            ElementHandle::new("t1", "p").with_text("Nenhuma prescrição de óculos"),
        );
        page.add_element(texts, ElementHandle::new("t2", "p").with_text("Pressão 14 mmHg"));

        let report = check_widgets(&actions(&page), Duration::from_secs(5)).await.unwrap();

        assert_eq!(report.panels.expanded, 1);
        assert_eq!(report.empty_states, vec!["Nenhuma prescrição de óculos"]);
    }
}
