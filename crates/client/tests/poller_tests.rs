//! Tracking-loop tests against a scripted status source.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sellora_client::{JobStatusView, PollEvent, PollOutcome, Poller, StatusApiError, StatusSource};
use sellora_core::job::JobStatus;
use sellora_core::poll_schedule::{PollConfig, PollPhase};

type Reply = Result<JobStatusView, StatusApiError>;

/// Replays scripted replies, then repeats `processing` forever.
struct ScriptedSource {
    replies: Mutex<VecDeque<Reply>>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Self::with_latency(replies, Duration::ZERO)
    }

    fn with_latency(replies: Vec<Reply>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            latency,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch(&self, job_id: &str) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(view(job_id, JobStatus::Processing, 50)));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

fn view(job_id: &str, status: JobStatus, progress: u8) -> JobStatusView {
    JobStatusView {
        job_id: job_id.to_string(),
        status,
        progress,
        style: "natural".to_string(),
        message: None,
        result: None,
        error: (status == JobStatus::Failed).then(|| "Applying style: boom".to_string()),
    }
}

fn fast_config() -> PollConfig {
    PollConfig {
        base_delay: Duration::from_millis(2),
        growth_factor: 1.5,
        max_delay: Duration::from_millis(10),
        backoff_after: Duration::from_secs(60),
        email_fallback_after: Duration::from_secs(120),
        retry_delay: Duration::from_millis(2),
        max_consecutive_failures: 2,
    }
}

async fn drain(mut rx: mpsc::Receiver<PollEvent>) -> Vec<PollEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn progress_updates(events: &[PollEvent]) -> Vec<(JobStatus, u8)> {
    events
        .iter()
        .filter_map(|e| match e {
            PollEvent::Update {
                status, progress, ..
            } => Some((*status, *progress)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn tracks_job_to_completion_in_order() {
    let source = ScriptedSource::new(vec![
        Ok(view("j", JobStatus::Queued, 0)),
        Ok(view("j", JobStatus::Processing, 20)),
        Ok(view("j", JobStatus::Processing, 50)),
        Ok(view("j", JobStatus::Completed, 100)),
    ]);
    let poller = Poller::new(Arc::clone(&source), fast_config());
    let (tx, rx) = mpsc::channel(64);

    let outcome = poller.track("j", CancellationToken::new(), tx).await;
    assert_matches!(outcome, PollOutcome::Completed(v) if v.progress == 100);

    let updates = progress_updates(&drain(rx).await);
    assert_eq!(
        updates,
        vec![
            (JobStatus::Queued, 0),
            (JobStatus::Processing, 20),
            (JobStatus::Processing, 50),
            (JobStatus::Completed, 100),
        ]
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn failed_job_stops_tracking_with_error() {
    let source = ScriptedSource::new(vec![
        Ok(view("j", JobStatus::Processing, 20)),
        Ok(view("j", JobStatus::Failed, 20)),
    ]);
    let poller = Poller::new(source, fast_config());
    let (tx, _rx) = mpsc::channel(64);

    let outcome = poller.track("j", CancellationToken::new(), tx).await;
    assert_matches!(outcome, PollOutcome::Failed(v) => {
        assert_eq!(v.error.as_deref(), Some("Applying style: boom"));
    });
}

#[tokio::test]
async fn cancelled_job_ends_tracking() {
    let source = ScriptedSource::new(vec![Ok(view("j", JobStatus::Cancelled, 50))]);
    let poller = Poller::new(source, fast_config());
    let (tx, _rx) = mpsc::channel(64);

    let outcome = poller.track("j", CancellationToken::new(), tx).await;
    assert_matches!(outcome, PollOutcome::Cancelled(_));
}

#[tokio::test]
async fn missing_job_is_reported_as_gone() {
    let source = ScriptedSource::new(vec![
        Ok(view("j", JobStatus::Processing, 20)),
        Err(StatusApiError::NotFound("Job not found".into())),
    ]);
    let poller = Poller::new(Arc::clone(&source), fast_config());
    let (tx, _rx) = mpsc::channel(64);

    let outcome = poller.track("j", CancellationToken::new(), tx).await;
    assert_eq!(outcome, PollOutcome::JobGone);
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn transient_failures_are_retried_and_reported() {
    let transient = || Err(StatusApiError::Transient("503: unavailable".into()));
    let source = ScriptedSource::new(vec![
        transient(),
        transient(),
        transient(),
        Ok(view("j", JobStatus::Completed, 100)),
    ]);
    let poller = Poller::new(source, fast_config());
    let (tx, rx) = mpsc::channel(64);

    let outcome = poller.track("j", CancellationToken::new(), tx).await;
    assert_matches!(outcome, PollOutcome::Completed(_));

    let trouble: Vec<u32> = drain(rx)
        .await
        .into_iter()
        .filter_map(|e| match e {
            PollEvent::ConnectionTrouble {
                consecutive_failures,
                ..
            } => Some(consecutive_failures),
            _ => None,
        })
        .collect();
    assert_eq!(trouble, vec![2]);
}

#[tokio::test]
async fn permanent_failures_end_tracking_without_retry() {
    let source = ScriptedSource::new(vec![
        Ok(view("j", JobStatus::Processing, 20)),
        Err(StatusApiError::Rejected {
            status: 400,
            message: "Invalid job id".into(),
        }),
    ]);
    let poller = Poller::new(Arc::clone(&source), fast_config());
    let (tx, _rx) = mpsc::channel(64);

    let outcome = tokio::time::timeout(
        Duration::from_millis(500),
        poller.track("j", CancellationToken::new(), tx),
    )
    .await
    .expect("a rejected request should end tracking");
    assert_matches!(outcome, PollOutcome::Error(message) if message.contains("400"));
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unreadable_response_ends_tracking() {
    let source = ScriptedSource::new(vec![Err(StatusApiError::InvalidResponse(
        "response has no data".into(),
    ))]);
    let poller = Poller::new(Arc::clone(&source), fast_config());
    let (tx, _rx) = mpsc::channel(64);

    let outcome = poller.track("j", CancellationToken::new(), tx).await;
    assert_matches!(outcome, PollOutcome::Error(_));
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancellation_discards_in_flight_response() {
    let source = ScriptedSource::with_latency(
        vec![Ok(view("j", JobStatus::Completed, 100))],
        Duration::from_secs(10),
    );
    let poller = Poller::new(source, fast_config());
    let (tx, rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        stopper.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(2), poller.track("j", cancel, tx))
        .await
        .expect("tracking should stop promptly");
    assert_eq!(outcome, PollOutcome::Stopped);
    assert!(progress_updates(&drain(rx).await).is_empty());
}

#[tokio::test]
async fn email_fallback_is_offered_once_while_polling_continues() {
    let config = PollConfig {
        backoff_after: Duration::from_millis(20),
        email_fallback_after: Duration::from_millis(60),
        ..fast_config()
    };
    let source = ScriptedSource::new(Vec::new());
    let poller = Poller::new(Arc::clone(&source), config);
    let (tx, mut rx) = mpsc::channel(256);
    let cancel = CancellationToken::new();

    let tracking = {
        let cancel = cancel.clone();
        tokio::spawn(async move { poller.track("j", cancel, tx).await })
    };

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let offered = event == PollEvent::EmailFallbackOffered;
        events.push(event);
        if offered {
            break;
        }
    }
    let calls_at_offer = source.calls.load(Ordering::SeqCst);

    // Keep consuming until a few more polls have happened.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while source.calls.load(Ordering::SeqCst) < calls_at_offer + 3 {
        assert!(tokio::time::Instant::now() < deadline, "polling stopped after the offer");
        if let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
            events.push(event);
        }
    }
    cancel.cancel();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(tracking.await.unwrap(), PollOutcome::Stopped);

    let phases: Vec<PollPhase> = events
        .iter()
        .filter_map(|e| match e {
            PollEvent::PhaseChanged(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(phases, vec![PollPhase::Backoff, PollPhase::EmailFallback]);
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == PollEvent::EmailFallbackOffered)
            .count(),
        1
    );
}

#[tokio::test]
async fn only_one_query_is_in_flight() {
    let source = ScriptedSource::with_latency(
        vec![
            Ok(view("j", JobStatus::Processing, 20)),
            Ok(view("j", JobStatus::Processing, 50)),
            Ok(view("j", JobStatus::Processing, 80)),
            Ok(view("j", JobStatus::Completed, 100)),
        ],
        Duration::from_millis(5),
    );
    let poller = Poller::new(Arc::clone(&source), fast_config());
    let (tx, _rx) = mpsc::channel(64);

    let outcome = poller.track("j", CancellationToken::new(), tx).await;
    assert_matches!(outcome, PollOutcome::Completed(_));
    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
}
