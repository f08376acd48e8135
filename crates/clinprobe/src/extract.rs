//! Data extraction from labelled chips.
//!
//! The records and exams screens show counters as `.mat-chip` elements whose
//! `aria-label` names the metric and whose value sits either in a nested
//! `.mat-badge-content` or in the chip text itself.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::driver::{ElementHandle, PageDriver};
use crate::locator::{locate_within, LocatorSpec};
use crate::result::{ProbeError, ProbeResult};
use crate::wait::WaitPolicy;

/// Class of the chip elements
pub const CHIP_CLASS: &str = "mat-chip";

/// Class of the badge nested in a chip
pub const BADGE_CLASS: &str = "mat-badge-content";

/// Pause before reading chips so counters have rendered
pub const DEFAULT_RENDER_DELAY_MS: u64 = 2_000;

/// Metric a chip label feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricField {
    /// Prescriptions found in the records
    Prescriptions,
    /// Procedure evidence found in the records
    Procedures,
    /// Measurements from records or exams (summed)
    Measurements,
    /// Groups found in the exams
    Groups,
}

/// Known chip labels and the field each one feeds
pub const LABELS: [(&str, MetricField); 5] = [
    (
        "Quantidade de prescrições encontradas no prontuário",
        MetricField::Prescriptions,
    ),
    (
        "Evidências de procedimentos encontradas no prontuário",
        MetricField::Procedures,
    ),
    (
        "Quantidade de medidas extraídas do prontuário",
        MetricField::Measurements,
    ),
    (
        "Quantidade de medidas extraídas do exame",
        MetricField::Measurements,
    ),
    (
        "Quantidade de grupos encontrados no exame",
        MetricField::Groups,
    ),
];

/// Field fed by `label`, if it is a known one
#[must_use]
pub fn field_for(label: &str) -> Option<MetricField> {
    LABELS
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, field)| *field)
}

/// Parse a counter; anything that is not a plain digit string counts as 0
#[must_use]
pub fn parse_count(text: &str) -> u32 {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    text.parse().unwrap_or(0)
}

/// Label and raw values read from one chip
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChipReading {
    /// Trimmed `aria-label`
    pub label: String,
    /// Text of the nested badge, if there is one
    pub badge: Option<String>,
    /// Text of the chip itself
    pub text: String,
}

impl ChipReading {
    /// Counter value, badge first
    #[must_use]
    pub fn value(&self) -> u32 {
        self.badge
            .as_deref()
            .map_or_else(|| parse_count(&self.text), parse_count)
    }
}

/// Counters read from the records and exams screens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetrics {
    /// Prescriptions found
    pub prescriptions: u32,
    /// Procedures found
    pub procedures: u32,
    /// Measurements from records and exams combined
    pub measurements: u32,
    /// Exam groups found
    pub groups: u32,
}

impl ExtractedMetrics {
    /// Fold chip readings into metrics; unknown labels are ignored
    #[must_use]
    pub fn from_readings<'a, I>(readings: I) -> Self
    where
        I: IntoIterator<Item = &'a ChipReading>,
    {
        let mut metrics = Self::default();
        for reading in readings {
            let value = reading.value();
            match field_for(&reading.label) {
                Some(MetricField::Prescriptions) => metrics.prescriptions = value,
                Some(MetricField::Procedures) => metrics.procedures = value,
                Some(MetricField::Measurements) => {
                    metrics.measurements = metrics.measurements.saturating_add(value);
                }
                Some(MetricField::Groups) => metrics.groups = value,
                None => {}
            }
        }
        metrics
    }
}

impl fmt::Display for ExtractedMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Prescriptions: {}, Procedures: {}, Measurements: {}, Groups: {}",
            self.prescriptions, self.procedures, self.measurements, self.groups
        )
    }
}

/// Read one chip
///
/// # Errors
///
/// Driver errors while reading the label
pub async fn read_chip(driver: &dyn PageDriver, chip: &ElementHandle) -> ProbeResult<ChipReading> {
    let label = driver
        .attribute(chip, "aria-label")
        .await?
        .map(|l| l.trim().to_string())
        .unwrap_or_default();

    let check_once = WaitPolicy::locator_default().with_timeout(Duration::ZERO);
    let badge_locator = LocatorSpec::class_name(BADGE_CLASS);
    let badge = match locate_within(driver, chip, &badge_locator, &check_once).await {
        Ok(mut badges) => Some(badges.swap_remove(0).text),
        Err(ProbeError::LocatorNotFound { .. } | ProbeError::LocatorTimeout { .. }) => None,
        Err(err) => return Err(err),
    };

    Ok(ChipReading {
        label,
        badge,
        text: chip.text.clone(),
    })
}

/// Read every chip on the current page into [`ExtractedMetrics`].
///
/// A chip that cannot be read is logged and skipped; a page without chips
/// yields all zeros.
pub async fn extract_metrics(driver: &dyn PageDriver, render_delay: Duration) -> ExtractedMetrics {
    sleep(render_delay).await;

    let chips = match driver.query_all(&LocatorSpec::class_name(CHIP_CLASS)).await {
        Ok(chips) => chips,
        Err(err) => {
            tracing::error!("Failed to extract data from page: {err}");
            Vec::new()
        }
    };

    let mut readings = Vec::with_capacity(chips.len());
    for chip in &chips {
        match read_chip(driver, chip).await {
            Ok(reading) => readings.push(reading),
            Err(err) => tracing::warn!("Failed to read a chip: {err}"),
        }
    }

    let metrics = ExtractedMetrics::from_readings(&readings);
    tracing::info!(tag = "data", "Extracted data - {metrics}");
    metrics
}
