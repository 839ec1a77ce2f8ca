//! Job processing pipeline.
//!
//! A [`Pipeline`] is an ordered list of named [`Stage`]s, each with a
//! progress checkpoint. [`Pipeline::run`] drives one job from `queued` to a
//! terminal state through the [`JobStore`](sellora_store::JobStore),
//! publishing lifecycle events as it goes. Stages are raced against the
//! run's cancellation token, so deleting a job interrupts the stage that is
//! currently awaiting.

pub mod config;
pub mod runner;
pub mod stage;
pub mod stages;

pub use config::{PipelineConfig, PipelineMode};
pub use runner::{Pipeline, PipelineError, PipelineStep, RunOutcome};
pub use stage::{Stage, StageContext, StageError};
