//! Concurrent job store.
//!
//! Reads take the shared lock and return snapshots; every mutation takes the
//! write lock for the whole read-modify-write so concurrent callers never
//! observe a half-applied change. Status changes are delegated to the
//! record's own state machine.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;

use sellora_core::job::{JobRecord, JobResult, JobStatus, JobSummary};
use sellora_core::types::JobId;

use crate::error::StoreError;

/// A record plus store-side bookkeeping.
struct StoredJob {
    record: JobRecord,
    /// Set once a pipeline run has taken ownership of the job.
    claimed: bool,
}

/// Filtered listing with counts over the whole store.
#[derive(Debug, Clone, Serialize)]
pub struct JobListing {
    /// Matching jobs, newest first.
    pub jobs: Vec<JobSummary>,
    pub total: usize,
    pub queued: usize,
    /// Jobs currently `processing`.
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Aggregate metrics for the system status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Mean `processingTimeMs` of completed jobs, if any.
    pub average_processing_time_ms: Option<i64>,
}

/// Process-wide job store.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, StoredJob>>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Create a fresh `queued` job and return its snapshot.
    pub async fn create(
        &self,
        source_ref: &str,
        style: &str,
        options: serde_json::Value,
    ) -> Result<JobRecord, StoreError> {
        let record = JobRecord::new(source_ref, style, options, Utc::now())?;
        let snapshot = record.clone();

        self.jobs.write().await.insert(
            record.id.clone(),
            StoredJob {
                record,
                claimed: false,
            },
        );

        tracing::debug!(job_id = %snapshot.id, style = %snapshot.style, "Job created");
        Ok(snapshot)
    }

    pub async fn get(&self, job_id: &str) -> Result<JobRecord, StoreError> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    /// Remove a job. A job that is still queued or processing is marked
    /// `cancelled` first; the returned record is its final state.
    pub async fn delete(&self, job_id: &str) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        let mut stored = jobs
            .remove(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;

        if !stored.record.is_terminal() {
            stored.record.cancel(Utc::now())?;
            tracing::info!(job_id, "Job cancelled on delete");
        }
        Ok(stored.record)
    }

    /// List jobs, optionally restricted to one status.
    pub async fn list(&self, filter: Option<JobStatus>) -> JobListing {
        let jobs = self.jobs.read().await;

        let mut listing = JobListing {
            jobs: Vec::new(),
            total: jobs.len(),
            queued: 0,
            active: 0,
            completed: 0,
            failed: 0,
        };

        for stored in jobs.values() {
            let record = &stored.record;
            match record.status {
                JobStatus::Queued => listing.queued += 1,
                JobStatus::Processing => listing.active += 1,
                JobStatus::Completed => listing.completed += 1,
                JobStatus::Failed => listing.failed += 1,
                JobStatus::Cancelled => {}
            }
            if filter.map_or(true, |status| record.status == status) {
                listing.jobs.push(record.summary());
            }
        }

        listing
            .jobs
            .sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.job_id.cmp(&b.job_id)));
        listing
    }

    /// Counts by status plus average processing time of completed jobs.
    pub async fn stats(&self) -> JobStats {
        let jobs = self.jobs.read().await;
        let mut stats = JobStats {
            total: jobs.len(),
            ..Default::default()
        };
        let mut processing_ms_sum: i64 = 0;

        for stored in jobs.values() {
            match stored.record.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
            if let Some(result) = &stored.record.result {
                processing_ms_sum = processing_ms_sum.saturating_add(result.processing_time_ms);
            }
        }

        if stats.completed > 0 {
            stats.average_processing_time_ms = Some(processing_ms_sum / stats.completed as i64);
        }
        stats
    }

    /// Whether a run should stop: the job is gone or was cancelled.
    pub async fn is_cancelled(&self, job_id: &str) -> bool {
        self.jobs
            .read()
            .await
            .get(job_id)
            .map_or(true, |stored| stored.record.status == JobStatus::Cancelled)
    }

    // -----------------------------------------------------------------------
    // Pipeline-only mutations
    // -----------------------------------------------------------------------

    /// Take ownership of a queued job for one pipeline run
    /// (`queued -> processing`). A job can be claimed at most once.
    pub async fn claim(&self, job_id: &str) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        let stored = live_entry(&mut jobs, job_id)?;

        if stored.claimed {
            return Err(StoreError::AlreadyClaimed(job_id.to_string()));
        }
        stored.record.start(Utc::now())?;
        stored.claimed = true;

        tracing::debug!(job_id, "Job claimed");
        Ok(stored.record.clone())
    }

    /// Record a stage checkpoint and the name of the next stage.
    pub async fn update_progress(
        &self,
        job_id: &str,
        progress: u8,
        message: Option<&str>,
    ) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        let stored = live_entry(&mut jobs, job_id)?;
        stored.record.advance(progress, message.map(str::to_string))?;
        Ok(stored.record.clone())
    }

    /// Mark a processing job as completed with its result.
    pub async fn complete(&self, job_id: &str, result: JobResult) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        let stored = live_entry(&mut jobs, job_id)?;
        stored.record.complete(result, Utc::now())?;
        Ok(stored.record.clone())
    }

    /// Mark a processing job as failed.
    pub async fn fail(&self, job_id: &str, error: &str) -> Result<JobRecord, StoreError> {
        let mut jobs = self.jobs.write().await;
        let stored = live_entry(&mut jobs, job_id)?;
        stored.record.fail(error, Utc::now())?;
        Ok(stored.record.clone())
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

/// Look up a job for a pipeline mutation, rejecting missing and cancelled
/// jobs.
fn live_entry<'a>(
    jobs: &'a mut HashMap<JobId, StoredJob>,
    job_id: &str,
) -> Result<&'a mut StoredJob, StoreError> {
    let stored = jobs
        .get_mut(job_id)
        .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
    if stored.record.status == JobStatus::Cancelled {
        return Err(StoreError::Cancelled(job_id.to_string()));
    }
    Ok(stored)
}
