/// Job identifiers are opaque UUID strings.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Allocate a fresh job identifier.
pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4().to_string()
}
