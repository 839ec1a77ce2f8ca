//! Typed HTTP client for the `/api/process` endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use sellora_core::job::{JobResult, JobStatus};
use sellora_core::types::JobId;

/// Job state as reported by `GET /api/process/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub style: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `data` of a `202 Accepted` submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub estimated_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    file_id: &'a str,
    style: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct NotifyBody<'a> {
    email: &'a str,
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, thiserror::Error)]
pub enum StatusApiError {
    /// The job (or endpoint) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure, timeout or 5xx. Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A 4xx the caller cannot fix by retrying.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl StatusApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for StatusApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

pub struct StatusApi {
    client: reqwest::Client,
    base_url: String,
}

impl StatusApi {
    /// Create a client for the server at `base_url`, e.g.
    /// `http://localhost:3001`. Each request gives up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StatusApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /api/process
    pub async fn submit(
        &self,
        file_id: &str,
        style: &str,
        options: Option<&serde_json::Value>,
    ) -> Result<SubmitResponse, StatusApiError> {
        let response = self
            .client
            .post(format!("{}/api/process", self.base_url))
            .json(&SubmitBody {
                file_id,
                style,
                options,
            })
            .send()
            .await?;
        Self::parse(response).await
    }

    /// GET /api/process/{id}
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusView, StatusApiError> {
        let response = self
            .client
            .get(format!("{}/api/process/{job_id}", self.base_url))
            .send()
            .await?;
        Self::parse(response).await
    }

    /// POST /api/process/{id}/notify
    pub async fn notify(&self, job_id: &str, email: &str) -> Result<(), StatusApiError> {
        let response = self
            .client
            .post(format!("{}/api/process/{job_id}/notify", self.base_url))
            .json(&NotifyBody { email })
            .send()
            .await?;
        Self::parse::<serde_json::Value>(response).await.map(|_| ())
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StatusApiError> {
        let status = response.status();
        if status.is_success() {
            let envelope: Envelope<T> = response.json().await?;
            return envelope
                .data
                .ok_or_else(|| StatusApiError::InvalidResponse("response has no data".into()));
        }

        let message = response
            .json::<Envelope<serde_json::Value>>()
            .await
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| status.to_string());

        Err(match status.as_u16() {
            404 => StatusApiError::NotFound(message),
            code if status.is_server_error() || code == 408 || code == 429 => {
                StatusApiError::Transient(format!("{code}: {message}"))
            }
            code => StatusApiError::Rejected {
                status: code,
                message,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_view_accepts_server_payload() {
        let json = serde_json::json!({
            "jobId": "j-1",
            "status": "processing",
            "progress": 50,
            "style": "natural",
            "message": "Enhancing features",
            "createdAt": "2026-01-01T00:00:00Z",
            "startedAt": null,
            "completedAt": null,
            "result": null,
            "error": null
        });
        let view: JobStatusView = serde_json::from_value(json).unwrap();
        assert_eq!(view.status, JobStatus::Processing);
        assert_eq!(view.progress, 50);
        assert_eq!(view.message.as_deref(), Some("Enhancing features"));
        assert!(view.result.is_none());
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(StatusApiError::Transient("503".into()).is_transient());
        assert!(!StatusApiError::NotFound("Job not found".into()).is_transient());
        assert!(!StatusApiError::Rejected {
            status: 400,
            message: "bad".into()
        }
        .is_transient());
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let api = StatusApi::new("http://localhost:3001/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url(), "http://localhost:3001");
    }
}
