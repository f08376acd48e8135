//! Patient cleanup through the REST API.
//!
//! `DELETE {URL_API}{patientId}` with `Content-Type: application/json` and an
//! `apiKey` header. Only HTTP 200 counts as success; nothing is retried here.

use std::time::Duration;

use tokio::time::Instant;

use crate::result::{ProbeError, ProbeResult};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "apiKey";

/// Request timeout for the deletion call
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the patient deletion endpoint
#[derive(Debug, Clone)]
pub struct DeletionClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl DeletionClient {
    /// Create a client for `base_url`; the patient id is appended verbatim
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self::with_client(base_url, api_key, client)
    }

    /// Create a client with a custom reqwest client
    pub fn with_client(
        base_url: impl Into<String>,
        api_key: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        }
    }

    /// Endpoint base
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL targeted for `patient_id`
    #[must_use]
    pub fn endpoint(&self, patient_id: &str) -> String {
        format!("{}{patient_id}", self.base_url)
    }

    /// Delete one patient.
    ///
    /// # Errors
    ///
    /// `ConfigMissing` without an API key (no request is sent), `HttpError`
    /// for any status other than 200 (with the response body) or for a
    /// transport fault (without a status).
    pub async fn delete_patient(&self, patient_id: &str) -> ProbeResult<()> {
        let start = Instant::now();
        let result = self.send(patient_id).await;

        match &result {
            Ok(()) => tracing::info!(tag = "ok", "Patient {patient_id} deleted"),
            Err(ProbeError::ConfigMissing { key }) => {
                tracing::error!("{key} not found, check the .env file");
            }
            Err(ProbeError::HttpError {
                status: Some(status),
                message,
            }) => tracing::error!(
                "Failed to delete patient {patient_id}. Status: {status}, Response: {message}"
            ),
            Err(err) => tracing::error!("Deletion endpoint call failed: {err}"),
        }
        tracing::info!(
            tag = "waiting",
            "Action 'delete patient {patient_id}' finished in {:.2} seconds",
            start.elapsed().as_secs_f64()
        );
        result
    }

    async fn send(&self, patient_id: &str) -> ProbeResult<()> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProbeError::config_missing("API_KEY"))?;

        let resp = self
            .client
            .delete(self.endpoint(patient_id))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProbeError::HttpError {
                status: Some(status.as_u16()),
                message: body,
            });
        }
        Ok(())
    }
}
