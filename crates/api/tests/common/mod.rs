#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use sellora_api::config::ServerConfig;
use sellora_api::engine::JobDispatcher;
use sellora_api::notifications::EmailSubscriptions;
use sellora_api::router::build_app_router;
use sellora_api::state::AppState;
use sellora_events::EventBus;
use sellora_pipeline::{Pipeline, PipelineConfig};
use sellora_store::JobStore;

/// Name of the source photo written into every test upload directory.
pub const SOURCE_FILE: &str = "abc.jpg";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        estimated_time: "30-60 seconds".to_string(),
    }
}

/// A fully wired application over temporary upload and output directories.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub uploads: TempDir,
    pub outputs: TempDir,
}

impl TestApp {
    /// Local-mode app whose simulated inference stage takes `inference`.
    pub fn new(inference: Duration) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let outputs = tempfile::tempdir().unwrap();

        let image = image::RgbImage::from_fn(48, 32, |x, y| {
            image::Rgb([(x * 5) as u8, (y * 7) as u8, 120])
        });
        image::DynamicImage::ImageRgb8(image)
            .save_with_format(uploads.path().join(SOURCE_FILE), image::ImageFormat::Jpeg)
            .unwrap();

        let pipeline_config = PipelineConfig {
            upload_dir: uploads.path().to_path_buf(),
            output_dir: outputs.path().to_path_buf(),
            simulated_inference: inference,
            ..PipelineConfig::default()
        };

        let config = test_config();
        let store = Arc::new(JobStore::new());
        let event_bus = Arc::new(EventBus::default());
        let dispatcher = Arc::new(JobDispatcher::new(
            Arc::new(Pipeline::local(pipeline_config)),
            Arc::clone(&store),
            Arc::clone(&event_bus),
        ));

        let state = AppState {
            config: Arc::new(config.clone()),
            store,
            event_bus,
            dispatcher,
            subscriptions: Arc::new(EmailSubscriptions::new()),
            started_at: Instant::now(),
        };

        Self {
            router: build_app_router(state.clone(), &config),
            state,
            uploads,
            outputs,
        }
    }

    /// Fast pipeline: jobs finish within a few milliseconds of work.
    pub fn fast() -> Self {
        Self::new(Duration::from_millis(10))
    }

    /// Slow pipeline: jobs stay in flight long enough to observe or cancel.
    pub fn slow() -> Self {
        Self::new(Duration::from_secs(30))
    }

    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Submit `{fileId, style}` and return the new job id.
    pub async fn submit(&self, style: &str) -> String {
        let response = post_json(
            self.app(),
            "/api/process",
            serde_json::json!({ "fileId": SOURCE_FILE, "style": style }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        json["data"]["jobId"].as_str().unwrap().to_string()
    }

    /// Poll `GET /api/process/{id}` until `done` accepts the job payload.
    pub async fn wait_for(&self, job_id: &str, done: impl Fn(&Value) -> bool) -> Value {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let response = get(self.app(), &format!("/api/process/{job_id}")).await;
            let json = body_json(response).await;
            if done(&json["data"]) {
                return json["data"].clone();
            }
            assert!(Instant::now() < deadline, "timed out waiting for job {job_id}: {json}");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn delete(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw(app: Router, uri: &str, content_type: &str, body: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
