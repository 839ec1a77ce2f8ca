use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sellora_api::config::ServerConfig;
use sellora_api::engine::JobDispatcher;
use sellora_api::notifications::{EmailSubscriptions, NotificationRouter};
use sellora_api::router::build_app_router;
use sellora_api::state::AppState;
use sellora_events::{EmailConfig, EmailDelivery, EventBus};
use sellora_pipeline::{Pipeline, PipelineConfig};
use sellora_store::JobStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sellora_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        mode = %pipeline_config.mode,
        upload_dir = %pipeline_config.upload_dir.display(),
        output_dir = %pipeline_config.output_dir.display(),
        "Loaded pipeline configuration",
    );

    // --- Storage directories ---
    tokio::fs::create_dir_all(&pipeline_config.upload_dir)
        .await
        .expect("Failed to create upload directory");
    tokio::fs::create_dir_all(&pipeline_config.output_dir)
        .await
        .expect("Failed to create output directory");

    // --- Pipeline ---
    let pipeline = Arc::new(
        Pipeline::from_config(pipeline_config).expect("Invalid pipeline configuration"),
    );
    tracing::info!(stages = pipeline.steps().len(), "Pipeline ready");

    // --- Store and event bus ---
    let store = Arc::new(JobStore::new());
    let event_bus = Arc::new(EventBus::default());

    // --- Email notifications ---
    let email = match EmailConfig::from_env() {
        Some(email_config) => {
            let delivery = EmailDelivery::new(email_config).expect("Invalid SMTP configuration");
            tracing::info!("SMTP delivery enabled");
            Some(delivery)
        }
        None => {
            tracing::info!("SMTP_HOST not set, notifications will be logged only");
            None
        }
    };
    let subscriptions = Arc::new(EmailSubscriptions::new());
    let notifications_cancel = CancellationToken::new();
    let notification_router = NotificationRouter::new(Arc::clone(&subscriptions), email);
    let router_handle = tokio::spawn(
        notification_router.run(event_bus.subscribe(), notifications_cancel.clone()),
    );

    // --- Dispatcher ---
    let dispatcher = Arc::new(JobDispatcher::new(
        Arc::clone(&pipeline),
        Arc::clone(&store),
        Arc::clone(&event_bus),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        event_bus,
        dispatcher: Arc::clone(&dispatcher),
        subscriptions,
        started_at: Instant::now(),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Runs still publish terminal events; the router drains them before
    // honouring its cancel token.
    dispatcher
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    tracing::info!("Dispatcher stopped");

    notifications_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), router_handle).await;
    tracing::info!("Notification router stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM (on Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
