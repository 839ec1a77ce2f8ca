//! In-memory job store.
//!
//! [`JobStore`] owns every [`JobRecord`](sellora_core::job::JobRecord) in the
//! process. It is constructed once at startup and shared via `Arc` between
//! the HTTP handlers and the pipeline runs.

pub mod error;
pub mod job_store;

pub use error::StoreError;
pub use job_store::{JobListing, JobStats, JobStore};
