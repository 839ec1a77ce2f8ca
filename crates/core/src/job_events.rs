//! Event type names published on the event bus for the job lifecycle.
//!
//! Used by the pipeline runner when a job changes state, and by the
//! notification router to decide which events trigger an email.

/// Job was claimed by a pipeline run and started processing.
pub const EVENT_JOB_STARTED: &str = "job.started";

/// A stage finished and the job reached a new progress checkpoint.
pub const EVENT_JOB_PROGRESS: &str = "job.progress";

/// Job completed successfully.
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// Job failed with an error.
pub const EVENT_JOB_FAILED: &str = "job.failed";

/// Job was cancelled (deleted while queued or processing).
pub const EVENT_JOB_CANCELLED: &str = "job.cancelled";

/// Whether an event type marks the end of a job's lifecycle.
pub fn is_terminal_event(event_type: &str) -> bool {
    matches!(
        event_type,
        EVENT_JOB_COMPLETED | EVENT_JOB_FAILED | EVENT_JOB_CANCELLED
    )
}
