//! Job tracking loop.
//!
//! [`Poller::track`] queries a [`StatusSource`] until the job reaches a
//! terminal state, the job disappears, or the caller cancels. Delays follow
//! the [`PollConfig`] phases; transient failures are retried after
//! `retry_delay`, any other failure ends tracking. Exactly one query is in flight at any time, and a query
//! still running when tracking is cancelled is dropped unread.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use sellora_core::job::JobStatus;
use sellora_core::poll_schedule::{PollConfig, PollPhase};

use crate::api::{JobStatusView, StatusApi, StatusApiError};

/// Where job status comes from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, job_id: &str) -> Result<JobStatusView, StatusApiError>;
}

#[async_trait]
impl StatusSource for StatusApi {
    async fn fetch(&self, job_id: &str) -> Result<JobStatusView, StatusApiError> {
        self.job_status(job_id).await
    }
}

#[async_trait]
impl<T: StatusSource + ?Sized> StatusSource for Arc<T> {
    async fn fetch(&self, job_id: &str) -> Result<JobStatusView, StatusApiError> {
        (**self).fetch(job_id).await
    }
}

/// Progress reported to the user while tracking.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A status response, in request order.
    Update {
        status: JobStatus,
        progress: u8,
        message: Option<String>,
    },
    PhaseChanged(PollPhase),
    /// Emitted once, on entering [`PollPhase::EmailFallback`].
    EmailFallbackOffered,
    /// Emitted every `max_consecutive_failures` failures in a row.
    ConnectionTrouble {
        consecutive_failures: u32,
        error: String,
    },
}

/// How tracking ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(JobStatusView),
    Failed(JobStatusView),
    Cancelled(JobStatusView),
    /// The server no longer knows the job, e.g. it was deleted.
    JobGone,
    /// A failure that retrying cannot fix, e.g. a rejected request or an
    /// unreadable response.
    Error(String),
    /// The caller cancelled tracking.
    Stopped,
}

pub struct Poller<S> {
    source: S,
    config: PollConfig,
}

impl<S: StatusSource> Poller<S> {
    pub fn new(source: S, config: PollConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Track `job_id` until it finishes or `cancel` fires.
    ///
    /// Events are sent on `events`; a dropped receiver does not stop
    /// tracking.
    pub async fn track(
        &self,
        job_id: &str,
        cancel: CancellationToken,
        events: mpsc::Sender<PollEvent>,
    ) -> PollOutcome {
        let started = Instant::now();
        let mut phase = PollPhase::Responsive;
        let mut polls: u32 = 0;
        let mut failures: u32 = 0;
        let mut fallback_offered = false;

        loop {
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PollOutcome::Stopped,
                response = self.source.fetch(job_id) => response,
            };

            let delay = match response {
                Ok(view) => {
                    failures = 0;
                    polls = polls.saturating_add(1);
                    tracing::debug!(
                        job_id,
                        status = view.status.as_str(),
                        progress = view.progress,
                        "Poll response",
                    );
                    emit(
                        &events,
                        PollEvent::Update {
                            status: view.status,
                            progress: view.progress,
                            message: view.message.clone(),
                        },
                    )
                    .await;

                    match view.status {
                        JobStatus::Completed => return PollOutcome::Completed(view),
                        JobStatus::Failed => return PollOutcome::Failed(view),
                        JobStatus::Cancelled => return PollOutcome::Cancelled(view),
                        JobStatus::Queued | JobStatus::Processing => {}
                    }
                    self.config.next_delay(started.elapsed(), polls)
                }
                Err(StatusApiError::NotFound(message)) => {
                    tracing::info!(job_id, %message, "Job no longer exists");
                    return PollOutcome::JobGone;
                }
                Err(e) if !e.is_transient() => {
                    tracing::error!(job_id, error = %e, "Poll failed permanently");
                    return PollOutcome::Error(e.to_string());
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(job_id, error = %e, failures, "Poll failed");
                    let threshold = self.config.max_consecutive_failures.max(1);
                    if failures % threshold == 0 {
                        emit(
                            &events,
                            PollEvent::ConnectionTrouble {
                                consecutive_failures: failures,
                                error: e.to_string(),
                            },
                        )
                        .await;
                    }
                    self.config.retry_delay
                }
            };

            let current = self.config.phase(started.elapsed());
            if current != phase {
                phase = current;
                tracing::info!(job_id, ?phase, "Poll phase changed");
                emit(&events, PollEvent::PhaseChanged(phase)).await;
            }
            if phase == PollPhase::EmailFallback && !fallback_offered {
                fallback_offered = true;
                emit(&events, PollEvent::EmailFallbackOffered).await;
            }

            if sleep_or_cancel(delay, &cancel).await {
                return PollOutcome::Stopped;
            }
        }
    }
}

async fn emit(events: &mpsc::Sender<PollEvent>, event: PollEvent) {
    if events.send(event).await.is_err() {
        tracing::trace!("Poll event receiver dropped");
    }
}

/// Returns `true` if cancelled before `delay` elapsed.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
