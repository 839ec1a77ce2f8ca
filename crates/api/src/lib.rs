//! Sellora API server library.
//!
//! Exposes config, state, error handling, routes and the job dispatcher so
//! integration tests and the binary entrypoint share them.

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod notifications;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
