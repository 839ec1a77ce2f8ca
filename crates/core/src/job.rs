//! Job record and lifecycle state machine.
//!
//! Every status change goes through [`JobRecord::transition`], which only
//! admits the edges
//!
//! ```text
//! queued -> processing -> completed
//!                      -> failed
//! queued | processing  -> cancelled
//! ```
//!
//! Progress is monotonic and reaches 100 only on completion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{new_job_id, JobId, Timestamp};

/// Progress value reported once a job has completed.
pub const PROGRESS_COMPLETE: u8 = 100;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of an enhancement job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal lifecycle edge.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Queued, Cancelled)
                | (Processing, Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::Validation(format!("Unknown job status '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// JobResult
// ---------------------------------------------------------------------------

/// Output references recorded when a job completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// Source asset the job was run against.
    pub original_file: String,
    /// Name of the enhanced output asset.
    pub enhanced_file: String,
    pub style: String,
    /// Wall time between `startedAt` and completion.
    pub processing_time_ms: i64,
    /// Human-readable list of applied enhancements, in application order.
    pub enhancements: Vec<String>,
    pub download_url: String,
    pub preview_url: String,
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// Tracked state of one enhancement request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    #[serde(rename = "jobId")]
    pub id: JobId,
    /// Uploaded asset name; the record never holds the bytes.
    #[serde(rename = "fileId")]
    pub source_ref: String,
    pub style: String,
    /// Validated enhancement options, frozen at submission.
    pub options: serde_json::Value,
    pub status: JobStatus,
    pub progress: u8,
    /// Name of the stage currently running, for display.
    pub message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl JobRecord {
    /// Build a fresh `queued` record.
    ///
    /// Fails with [`CoreError::Validation`] when the source reference or
    /// style is empty.
    pub fn new(
        source_ref: &str,
        style: &str,
        options: serde_json::Value,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        if source_ref.trim().is_empty() || style.trim().is_empty() {
            return Err(CoreError::Validation(
                "fileId and style are required".to_string(),
            ));
        }

        Ok(Self {
            id: new_job_id(),
            source_ref: source_ref.to_string(),
            style: style.to_string(),
            options,
            status: JobStatus::Queued,
            progress: 0,
            message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        })
    }

    /// The single mutation point for `status`.
    fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "Job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// `queued -> processing`, stamping `startedAt`.
    pub fn start(&mut self, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(now);
        self.progress = 0;
        Ok(())
    }

    /// Record a stage checkpoint while processing.
    ///
    /// The checkpoint must not go backwards and must stay below 100, which
    /// is reserved for completion.
    pub fn advance(&mut self, progress: u8, message: Option<String>) -> Result<(), CoreError> {
        if self.status != JobStatus::Processing {
            return Err(CoreError::Conflict(format!(
                "Job {} is {}, not processing",
                self.id, self.status
            )));
        }
        if progress >= PROGRESS_COMPLETE {
            return Err(CoreError::Validation(format!(
                "Checkpoint {progress} is reserved for completion"
            )));
        }
        if progress < self.progress {
            return Err(CoreError::Conflict(format!(
                "Progress for job {} cannot decrease from {} to {progress}",
                self.id, self.progress
            )));
        }
        self.progress = progress;
        if message.is_some() {
            self.message = message;
        }
        Ok(())
    }

    /// `processing -> completed` with the output references.
    pub fn complete(&mut self, result: JobResult, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Completed)?;
        self.progress = PROGRESS_COMPLETE;
        self.completed_at = Some(now);
        self.result = Some(result);
        Ok(())
    }

    /// `processing -> failed` with a display-ready reason.
    pub fn fail(&mut self, error: impl Into<String>, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Failed)?;
        self.completed_at = Some(now);
        self.error = Some(error.into());
        Ok(())
    }

    /// `queued | processing -> cancelled`.
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Cancelled)?;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Condensed view used by job listings.
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            style: self.style.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Listing entry for `GET /api/process`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub style: String,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn queued() -> JobRecord {
        JobRecord::new("abc.jpg", "natural", serde_json::json!({}), Utc::now()).unwrap()
    }

    fn sample_result() -> JobResult {
        JobResult {
            original_file: "abc.jpg".into(),
            enhanced_file: "enhanced_abc.jpg".into(),
            style: "natural".into(),
            processing_time_ms: 10,
            enhancements: vec!["Resized to 10x10".into()],
            download_url: "/outputs/enhanced_abc.jpg".into(),
            preview_url: "/outputs/enhanced_abc.jpg".into(),
        }
    }

    #[test]
    fn new_record_is_queued_with_zero_progress() {
        let job = queued();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.result.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn new_record_requires_source_and_style() {
        let err = JobRecord::new("", "natural", serde_json::json!({}), Utc::now()).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg == "fileId and style are required");

        let err = JobRecord::new("abc.jpg", "  ", serde_json::json!({}), Utc::now()).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn only_documented_edges_are_legal() {
        use JobStatus::*;
        let legal = [
            (Queued, Processing),
            (Processing, Completed),
            (Processing, Failed),
            (Queued, Cancelled),
            (Processing, Cancelled),
        ];
        for from in JobStatus::ALL {
            for to in JobStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn happy_path_reaches_completed_with_full_progress() {
        let mut job = queued();
        job.start(Utc::now()).unwrap();
        job.advance(20, Some("Analyzing image".into())).unwrap();
        job.advance(50, None).unwrap();
        assert_eq!(job.message.as_deref(), Some("Analyzing image"));

        job.complete(sample_result(), Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, PROGRESS_COMPLETE);
        assert!(job.completed_at.is_some());
        assert!(job.result.is_some());
        assert!(job.error.is_none());
    }

    #[test]
    fn progress_cannot_decrease_or_reach_100_early() {
        let mut job = queued();
        job.start(Utc::now()).unwrap();
        job.advance(50, None).unwrap();

        assert_matches!(job.advance(20, None), Err(CoreError::Conflict(_)));
        assert_matches!(job.advance(100, None), Err(CoreError::Validation(_)));
        assert_eq!(job.progress, 50);
    }

    #[test]
    fn advance_requires_processing() {
        let mut job = queued();
        assert_matches!(job.advance(10, None), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn failure_sets_error_not_result() {
        let mut job = queued();
        job.start(Utc::now()).unwrap();
        job.fail("Applying style: decode error", Utc::now()).unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("Applying style: decode error"));
        assert!(job.result.is_none());
        assert!(job.progress < PROGRESS_COMPLETE);
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut job = queued();
        job.start(Utc::now()).unwrap();
        job.complete(sample_result(), Utc::now()).unwrap();

        assert_matches!(job.fail("late", Utc::now()), Err(CoreError::Conflict(_)));
        assert_matches!(job.cancel(Utc::now()), Err(CoreError::Conflict(_)));
        assert_matches!(job.start(Utc::now()), Err(CoreError::Conflict(_)));
        assert!(job.error.is_none());
    }

    #[test]
    fn queued_job_can_be_cancelled_but_not_completed() {
        let mut job = queued();
        assert_matches!(
            job.complete(sample_result(), Utc::now()),
            Err(CoreError::Conflict(_))
        );
        job.cancel(Utc::now()).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Processing".parse::<JobStatus>().unwrap(), JobStatus::Processing);
        assert_matches!("running".parse::<JobStatus>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn record_serializes_with_wire_field_names() {
        let job = queued();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["jobId"], job.id.as_str());
        assert_eq!(json["fileId"], "abc.jpg");
        assert_eq!(json["status"], "queued");
        assert!(json["startedAt"].is_null());
        assert!(json["result"].is_null());
        assert!(json["error"].is_null());
    }
}
