use sellora_core::error::CoreError;
use sellora_core::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// A pipeline run already owns this job.
    #[error("Job {0} has already been claimed")]
    AlreadyClaimed(JobId),

    #[error("Job {0} was cancelled")]
    Cancelled(JobId),

    /// Rejected by the record's state machine or validation.
    #[error(transparent)]
    Job(#[from] CoreError),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoreError::NotFound { entity: "Job", id },
            StoreError::AlreadyClaimed(_) | StoreError::Cancelled(_) => {
                CoreError::Conflict(err.to_string())
            }
            StoreError::Job(inner) => inner,
        }
    }
}
