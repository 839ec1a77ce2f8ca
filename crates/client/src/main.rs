//! `sellora-poll` -- submit a photo for enhancement and follow the job.
//!
//! # Environment variables
//!
//! | Variable          | Required | Default                 | Description                         |
//! |-------------------|----------|-------------------------|-------------------------------------|
//! | `SELLORA_API_URL` | no       | `http://localhost:3001` | API server base URL                 |
//! | `NOTIFY_EMAIL`    | no       | --                      | Accept the email fallback with this |

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sellora_client::{PollEvent, PollOutcome, Poller, StatusApi};
use sellora_core::poll_schedule::PollConfig;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sellora_client=info,sellora_poll=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let api = match StatusApi::new(&cli.api_url, Duration::from_secs(cli.timeout_secs)) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        }
    };

    let job_id = match cli.command {
        Commands::Submit {
            file_id,
            style,
            options,
        } => {
            let options: Option<serde_json::Value> =
                match options.as_deref().map(serde_json::from_str).transpose() {
                    Ok(options) => options,
                    Err(e) => {
                        tracing::error!(error = %e, "--options must be valid JSON");
                        std::process::exit(2);
                    }
                };
            match api.submit(&file_id, &style, options.as_ref()).await {
                Ok(accepted) => {
                    println!(
                        "Job {} {} (estimated {})",
                        accepted.job_id,
                        accepted.status.as_str(),
                        accepted.estimated_time
                    );
                    accepted.job_id
                }
                Err(e) => {
                    tracing::error!(error = %e, "Submission failed");
                    std::process::exit(1);
                }
            }
        }
        Commands::Track { job_id } => job_id,
    };

    let code = track(api, &job_id, cli.notify_email).await;
    std::process::exit(code);
}

/// Track `job_id` until it finishes or Ctrl-C, returning the exit code.
async fn track(api: Arc<StatusApi>, job_id: &str, notify_email: Option<String>) -> i32 {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, stopping");
            ctrl_c.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel(32);
    let printer = {
        let api = Arc::clone(&api);
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                report(&api, &job_id, notify_email.as_deref(), event).await;
            }
        })
    };

    let poller = Poller::new(Arc::clone(&api), PollConfig::default());
    let outcome = poller.track(job_id, cancel, tx).await;
    let _ = printer.await;

    match outcome {
        PollOutcome::Completed(view) => {
            match view.result {
                Some(result) => println!(
                    "Completed in {} ms: {}{}",
                    result.processing_time_ms,
                    api.base_url(),
                    result.download_url
                ),
                None => println!("Completed"),
            }
            0
        }
        PollOutcome::Failed(view) => {
            println!("Failed: {}", view.error.as_deref().unwrap_or("unknown error"));
            1
        }
        PollOutcome::Cancelled(_) => {
            println!("Job was cancelled");
            1
        }
        PollOutcome::JobGone => {
            println!("Job no longer exists");
            1
        }
        PollOutcome::Error(error) => {
            println!("Stopped tracking: {error}");
            1
        }
        PollOutcome::Stopped => 130,
    }
}

async fn report(api: &StatusApi, job_id: &str, notify_email: Option<&str>, event: PollEvent) {
    match event {
        PollEvent::Update {
            status,
            progress,
            message,
        } => {
            println!(
                "[{:>3}%] {} {}",
                progress,
                status.as_str(),
                message.unwrap_or_default()
            );
        }
        PollEvent::PhaseChanged(phase) => {
            tracing::debug!(?phase, "Poll phase changed");
        }
        PollEvent::EmailFallbackOffered => match notify_email {
            Some(email) => match api.notify(job_id, email).await {
                Ok(()) => {
                    println!("This is taking a while. We will email {email} when it is ready.")
                }
                Err(e) => tracing::warn!(error = %e, "Failed to register email notification"),
            },
            None => println!(
                "This is taking a while. Set NOTIFY_EMAIL to be emailed when it is ready."
            ),
        },
        PollEvent::ConnectionTrouble {
            consecutive_failures,
            error,
        } => {
            println!("Having trouble reaching the server ({consecutive_failures} attempts): {error}");
        }
    }
}
