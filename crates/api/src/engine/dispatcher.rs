//! Background job dispatcher.
//!
//! Every accepted job gets its own pipeline run on a tracked Tokio task.
//! The dispatcher keeps one [`CancellationToken`] per active run so that
//! deleting a job interrupts whatever stage is currently awaiting, and it
//! refuses to start a second run for a job id that is already running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use sellora_core::types::JobId;
use sellora_events::EventBus;
use sellora_pipeline::{Pipeline, RunOutcome};
use sellora_store::JobStore;

/// Grace period for runs to observe cancellation once the shutdown timeout
/// has elapsed.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

pub struct JobDispatcher {
    pipeline: Arc<Pipeline>,
    store: Arc<JobStore>,
    event_bus: Arc<EventBus>,
    active: Mutex<HashMap<JobId, CancellationToken>>,
    tracker: TaskTracker,
    /// Parent of every run token; cancelled when shutdown runs out of time.
    shutdown: CancellationToken,
}

impl JobDispatcher {
    pub fn new(pipeline: Arc<Pipeline>, store: Arc<JobStore>, event_bus: Arc<EventBus>) -> Self {
        Self {
            pipeline,
            store,
            event_bus,
            active: Mutex::new(HashMap::new()),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Spawn a pipeline run for `job_id`.
    ///
    /// Returns `false` without spawning when a run for the job is already
    /// active or the dispatcher is shutting down.
    pub async fn dispatch(self: &Arc<Self>, job_id: JobId) -> bool {
        if self.tracker.is_closed() {
            tracing::warn!(job_id = %job_id, "Dispatcher is shutting down, job not started");
            return false;
        }

        let token = self.shutdown.child_token();
        {
            let mut active = self.active.lock().await;
            if active.contains_key(&job_id) {
                tracing::warn!(job_id = %job_id, "Job already has an active run");
                return false;
            }
            active.insert(job_id.clone(), token.clone());
        }

        let this = Arc::clone(self);
        self.tracker.spawn(async move {
            let outcome = this
                .pipeline
                .run(&this.store, &this.event_bus, &job_id, token)
                .await;

            match &outcome {
                RunOutcome::Completed(_) | RunOutcome::Failed(_) | RunOutcome::Cancelled => {
                    tracing::debug!(job_id = %job_id, ?outcome, "Run finished");
                }
                RunOutcome::Skipped(reason) => {
                    tracing::warn!(job_id = %job_id, reason = %reason, "Run skipped");
                }
            }

            this.active.lock().await.remove(&job_id);
        });

        true
    }

    /// Trigger the cancellation token of the job's active run, if any.
    pub async fn cancel(&self, job_id: &str) -> bool {
        match self.active.lock().await.get(job_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(job_id, "Active run cancelled");
                true
            }
            None => false,
        }
    }

    /// Number of runs currently in flight.
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Stop accepting jobs and wait up to `timeout` for active runs to
    /// finish. Runs still going after that are cancelled.
    pub async fn shutdown(&self, timeout: Duration) {
        self.tracker.close();
        let in_flight = self.tracker.len();
        tracing::info!(in_flight, "Waiting for pipeline runs to finish");

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                remaining = self.tracker.len(),
                "Shutdown timeout elapsed, cancelling remaining runs",
            );
            self.shutdown.cancel();
            if tokio::time::timeout(CANCEL_GRACE, self.tracker.wait())
                .await
                .is_err()
            {
                tracing::error!(remaining = self.tracker.len(), "Pipeline runs did not stop");
            }
        }
    }
}
