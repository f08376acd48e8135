//! Test patient created by the workflow.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Name given to the test patient
pub const TEST_PATIENT_NAME: &str = "Teste Automatizado";

/// Birthdate typed into the `DD/MM/AAAA` field (digits only)
pub const TEST_PATIENT_BIRTHDATE: &str = "20051995";

/// Gender option selected for the test patient
pub const TEST_PATIENT_GENDER: &str = "Feminino";

fn patient_path() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"/patient/(\d+)/").ok())
        .as_ref()
}

/// Patient id embedded in an application URL such as `.../patient/42/records`
#[must_use]
pub fn patient_id_from_url(url: &str) -> Option<String> {
    patient_path()?
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Patient registered during one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Server id, known once the app navigates to the patient page
    pub id: Option<String>,
    /// Full name
    pub name: String,
    /// Birthdate as typed
    pub birthdate: String,
    /// Gender option
    pub gender: String,
}

impl PatientRecord {
    /// The fixed test patient, not yet saved
    #[must_use]
    pub fn test_patient() -> Self {
        Self {
            id: None,
            name: TEST_PATIENT_NAME.to_string(),
            birthdate: TEST_PATIENT_BIRTHDATE.to_string(),
            gender: TEST_PATIENT_GENDER.to_string(),
        }
    }

    /// Record the id found in `url`; returns whether one was found
    pub fn capture_id(&mut self, url: &str) -> bool {
        if let Some(id) = patient_id_from_url(url) {
            self.id = Some(id);
            true
        } else {
            false
        }
    }
}

impl Default for PatientRecord {
    fn default() -> Self {
        Self::test_patient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_url() {
        assert_eq!(
            patient_id_from_url("https://staging.voiston.ai/patient/1234/overview").as_deref(),
            Some("1234")
        );
    }

    #[test]
    fn test_id_requires_trailing_slash() {
        assert_eq!(patient_id_from_url("https://host/patient/1234"), None);
        assert_eq!(patient_id_from_url("https://host/patient/abc/"), None);
        assert_eq!(patient_id_from_url("https://host/user/login?dp_id=MTA0"), None);
    }

    #[test]
    fn test_capture_keeps_previous_id_on_miss() {
        let mut patient = PatientRecord::test_patient();
        assert!(patient.capture_id("https://host/patient/7/exams"));
        assert!(!patient.capture_id("https://host/home"));
        assert_eq!(patient.id.as_deref(), Some("7"));
        assert_eq!(patient.name, TEST_PATIENT_NAME);
    }
}
