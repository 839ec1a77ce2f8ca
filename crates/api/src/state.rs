use std::sync::Arc;
use std::time::Instant;

use sellora_events::EventBus;
use sellora_store::JobStore;

use crate::config::ServerConfig;
use crate::engine::JobDispatcher;
use crate::notifications::EmailSubscriptions;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is `Copy`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Single source of truth for job records.
    pub store: Arc<JobStore>,
    /// Lifecycle events, consumed by the notification router.
    pub event_bus: Arc<EventBus>,
    /// Spawns and cancels pipeline runs.
    pub dispatcher: Arc<JobDispatcher>,
    /// Addresses waiting for a job's terminal state.
    pub subscriptions: Arc<EmailSubscriptions>,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}
