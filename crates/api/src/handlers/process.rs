//! Handlers for the `/process` resource.
//!
//! Submission validates the request, creates a `queued` job and hands it to
//! the dispatcher before returning `202 Accepted`; every other endpoint reads
//! the store. Only `DELETE` mutates a job, by cancelling and removing it.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use sellora_core::enhance::EnhanceOptions;
use sellora_core::error::CoreError;
use sellora_core::job::{JobRecord, JobResult, JobStatus};
use sellora_core::job_events::EVENT_JOB_CANCELLED;
use sellora_core::style::Style;
use sellora_core::types::{JobId, Timestamp};
use sellora_events::delivery::email::parse_address;
use sellora_events::PlatformEvent;

use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAccepted {
    pub job_id: JobId,
    pub status: JobStatus,
    pub estimated_time: String,
}

/// Job state as returned to pollers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub style: String,
    pub message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl From<JobRecord> for JobView {
    fn from(job: JobRecord) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            style: job.style,
            message: job.message,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            result: job.result,
            error: job.error,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedJob {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyAccepted {
    pub job_id: JobId,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/process
///
/// Validates `fileId`, `style` and `options`, checks the source asset exists
/// in the upload directory, then creates and dispatches the job.
pub async fn submit_job(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;

    let file_id = input.file_id.unwrap_or_default();
    let raw_style = input.style.unwrap_or_default();
    if file_id.trim().is_empty() || raw_style.trim().is_empty() {
        return Err(CoreError::Validation("fileId and style are required".into()).into());
    }

    let style: Style = raw_style.parse()?;
    let options = input.options.unwrap_or(serde_json::Value::Null);
    EnhanceOptions::from_value(&options)?;

    let source = state
        .dispatcher
        .pipeline()
        .config()
        .source_path(&file_id)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid fileId '{file_id}'")))?;
    if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
        return Err(CoreError::NotFound {
            entity: "File",
            id: file_id,
        }
        .into());
    }

    let job = state.store.create(&file_id, style.as_str(), options).await?;
    tracing::info!(job_id = %job.id, file_id = %job.source_ref, style = %job.style, "Job submitted");

    if !state.dispatcher.dispatch(job.id.clone()).await {
        // Nothing will ever run it.
        if let Err(e) = state.store.delete(&job.id).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to discard undispatched job");
        }
        return Err(AppError::ServiceUnavailable(
            "Server is shutting down, try again shortly".into(),
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::with_message(
            "Processing started",
            SubmitAccepted {
                job_id: job.id,
                status: job.status,
                estimated_time: state.config.estimated_time.clone(),
            },
        )),
    ))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/process/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.get(&job_id).await?;
    Ok(Json(ApiResponse::new(JobView::from(job))))
}

/// GET /api/process?status=<status>
///
/// Newest first. Counts in the response always cover the whole store.
pub async fn list_jobs(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = query?;
    let filter = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<JobStatus>()?),
    };

    let listing = state.store.list(filter).await;
    Ok(Json(ApiResponse::new(listing)))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/process/{id}
///
/// A queued or processing job is marked `cancelled` and its run interrupted
/// before the record is removed.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.delete(&job_id).await?;
    let interrupted = state.dispatcher.cancel(&job_id).await;

    if job.status == JobStatus::Cancelled {
        state.event_bus.publish(
            PlatformEvent::new(EVENT_JOB_CANCELLED)
                .with_job(job_id.clone())
                .with_payload(serde_json::json!({
                    "status": job.status,
                    "style": job.style,
                })),
        );
    }

    tracing::info!(job_id = %job_id, status = %job.status.as_str(), interrupted, "Job deleted");

    Ok(Json(ApiResponse::with_message(
        "Job deleted successfully",
        DeletedJob {
            job_id: job.id,
            status: job.status,
        },
    )))
}

// ---------------------------------------------------------------------------
// Notify
// ---------------------------------------------------------------------------

/// POST /api/process/{id}/notify
///
/// Registers an address to be emailed when the job finishes.
pub async fn notify_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    payload: Result<Json<NotifyRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    let address = parse_address(input.email.as_deref().unwrap_or_default())
        .map_err(|_| CoreError::Validation("A valid email address is required".into()))?;

    let email = address.to_string();

    // Register before reading the job: a terminal event published after the
    // read is then guaranteed to find this address.
    let added = state.subscriptions.subscribe(&job_id, email.clone()).await;
    let job = match state.store.get(&job_id).await {
        Ok(job) => job,
        Err(e) => {
            if added {
                state.subscriptions.unsubscribe(&job_id, &email).await;
            }
            return Err(e.into());
        }
    };
    // Still registered means the router has not consumed it for this job.
    if job.is_terminal() && added && state.subscriptions.unsubscribe(&job_id, &email).await {
        return Err(CoreError::Conflict(format!(
            "Job is already {}",
            job.status.as_str()
        ))
        .into());
    }

    tracing::info!(job_id = %job_id, added, "Email notification registered");

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::with_message(
            "You will be emailed when processing finishes",
            NotifyAccepted { job_id, email },
        )),
    ))
}
