//! Sellora domain core.
//!
//! Pure types and logic shared by the server, the pipeline and the client:
//! the job record and its state machine, style presets, the deterministic
//! image transform pipeline, and the client poll schedule.

pub mod enhance;
pub mod error;
pub mod job;
pub mod job_events;
pub mod poll_schedule;
pub mod style;
pub mod transform;
pub mod types;
