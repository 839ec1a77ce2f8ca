//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! The pipeline publishes a [`PlatformEvent`] for every job lifecycle change;
//! the notification router subscribes to them. Shared via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use sellora_core::types::JobId;

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A job lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"job.completed"`.
    pub event_type: String,

    /// Job the event is about, if any.
    pub job_id: Option<JobId>,

    /// Event-specific data (status, progress, result or error).
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            job_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_job(mut self, job_id: impl Into<JobId>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus; every subscriber sees every event published after it
/// subscribed.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity. Slow receivers that
    /// fall more than `capacity` events behind observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped when nobody listens.
    pub fn publish(&self, event: PlatformEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use sellora_core::job_events::{EVENT_JOB_COMPLETED, EVENT_JOB_STARTED};

    use super::*;

    #[tokio::test]
    async fn subscriber_receives_job_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            PlatformEvent::new(EVENT_JOB_COMPLETED)
                .with_job("job-1")
                .with_payload(serde_json::json!({"progress": 100})),
        );

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, EVENT_JOB_COMPLETED);
        assert_eq!(received.job_id.as_deref(), Some("job-1"));
        assert_eq!(received.payload["progress"], 100);
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::new(EVENT_JOB_STARTED));

        assert_eq!(rx1.recv().await.unwrap().event_type, EVENT_JOB_STARTED);
        assert_eq!(rx2.recv().await.unwrap().event_type, EVENT_JOB_STARTED);
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::new("orphan"));
    }
}
