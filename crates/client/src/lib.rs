//! `sellora-client` library crate.
//!
//! - [`api::StatusApi`]: typed HTTP client for `/api/process`.
//! - [`poller::Poller`]: tracks one job to a terminal state using the
//!   three-phase [`PollConfig`](sellora_core::poll_schedule::PollConfig)
//!   schedule.
//!
//! The `sellora-poll` binary lives in `main.rs`.

pub mod api;
pub mod poller;

pub use api::{JobStatusView, StatusApi, StatusApiError, SubmitResponse};
pub use poller::{PollEvent, PollOutcome, Poller, StatusSource};
