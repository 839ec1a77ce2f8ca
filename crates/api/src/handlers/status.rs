//! System status and job metrics.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use sellora_core::types::Timestamp;
use sellora_pipeline::PipelineMode;

use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Operational,
    Degraded,
}

impl ServiceStatus {
    fn from_healthy(healthy: bool) -> Self {
        if healthy {
            Self::Operational
        } else {
            Self::Degraded
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Services {
    pub api: ServiceStatus,
    /// Dispatcher accepting new runs.
    pub processing: ServiceStatus,
    /// Upload and output directories reachable.
    pub storage: ServiceStatus,
    /// Enhancement backend configured for the current mode.
    pub ai: ServiceStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetrics {
    pub total_jobs: usize,
    pub queued_jobs: usize,
    pub active_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub cancelled_jobs: usize,
    /// Pipeline runs currently holding a cancellation token.
    pub active_runs: usize,
    pub average_processing_time_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub status: ServiceStatus,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub timestamp: Timestamp,
    /// `local` or `webhook`.
    pub pipeline_mode: &'static str,
    pub services: Services,
    pub metrics: JobMetrics,
}

async fn is_dir(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_dir())
}

/// GET /api/status
pub async fn system_status(State(state): State<AppState>) -> Json<ApiResponse<SystemStatus>> {
    let pipeline = state.dispatcher.pipeline().config();

    let storage_ok = is_dir(&pipeline.upload_dir).await && is_dir(&pipeline.output_dir).await;
    let ai_ok = match pipeline.mode {
        PipelineMode::Local => true,
        PipelineMode::Webhook => pipeline.webhook_url.is_some(),
    };
    let services = Services {
        api: ServiceStatus::Operational,
        processing: ServiceStatus::from_healthy(!state.dispatcher.is_shutting_down()),
        storage: ServiceStatus::from_healthy(storage_ok),
        ai: ServiceStatus::from_healthy(ai_ok),
    };
    let all_ok = [services.processing, services.storage, services.ai]
        .iter()
        .all(|s| *s == ServiceStatus::Operational);

    let stats = state.store.stats().await;
    let metrics = JobMetrics {
        total_jobs: stats.total,
        queued_jobs: stats.queued,
        active_jobs: stats.processing,
        completed_jobs: stats.completed,
        failed_jobs: stats.failed,
        cancelled_jobs: stats.cancelled,
        active_runs: state.dispatcher.active_count().await,
        average_processing_time_ms: stats.average_processing_time_ms,
    };

    Json(ApiResponse::new(SystemStatus {
        status: ServiceStatus::from_healthy(all_ok),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
        pipeline_mode: pipeline.mode.as_str(),
        services,
        metrics,
    }))
}
