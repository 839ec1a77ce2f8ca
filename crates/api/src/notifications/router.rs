//! Event-to-notification routing engine.
//!
//! [`NotificationRouter`] subscribes to the platform event bus and, whenever
//! a job reaches a terminal state, emails every address registered for it.
//! Without SMTP configuration the notification is logged instead.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use sellora_core::job_events::is_terminal_event;
use sellora_events::{EmailDelivery, PlatformEvent};

use super::EmailSubscriptions;

pub struct NotificationRouter {
    subscriptions: Arc<EmailSubscriptions>,
    email: Option<EmailDelivery>,
}

impl NotificationRouter {
    pub fn new(subscriptions: Arc<EmailSubscriptions>, email: Option<EmailDelivery>) -> Self {
        Self {
            subscriptions,
            email,
        }
    }

    /// Run the main routing loop.
    ///
    /// Exits once `cancel` fires and no event is waiting, or when the channel
    /// is closed (i.e. the [`EventBus`](sellora_events::EventBus) is dropped).
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            // Queued events win over cancellation so terminal events
            // published before shutdown are still delivered.
            let received = tokio::select! {
                biased;
                received = receiver.recv() => received,
                _ = cancel.cancelled() => {
                    tracing::info!("Notification router shutting down");
                    break;
                }
            };

            match received {
                Ok(event) => self.route_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    async fn route_event(&self, event: &PlatformEvent) {
        if !is_terminal_event(&event.event_type) {
            return;
        }
        let Some(job_id) = event.job_id.as_deref() else {
            return;
        };

        let recipients = self.subscriptions.take(job_id).await;
        for to in &recipients {
            match &self.email {
                Some(delivery) => {
                    if let Err(e) = delivery.deliver(to, event).await {
                        tracing::error!(
                            error = %e,
                            job_id,
                            to = %to,
                            event_type = %event.event_type,
                            "Failed to send notification email",
                        );
                    }
                }
                None => {
                    tracing::info!(
                        job_id,
                        to = %to,
                        event_type = %event.event_type,
                        "SMTP not configured, notification logged only",
                    );
                }
            }
        }
    }
}
