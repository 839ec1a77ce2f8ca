//! Email notification delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send a
//! plain-text message when a tracked job reaches a terminal state. If
//! `SMTP_HOST` is not set, [`EmailConfig::from_env`] returns `None` and the
//! caller logs notifications instead of sending them.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use sellora_core::job_events::{EVENT_JOB_CANCELLED, EVENT_JOB_COMPLETED, EVENT_JOB_FAILED};

use crate::bus::PlatformEvent;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// Authentication, connection or protocol failure.
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

/// Parse and validate a recipient address.
pub fn parse_address(input: &str) -> Result<Address, EmailError> {
    Ok(input.trim().parse::<Address>()?)
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

const DEFAULT_SMTP_PORT: u16 = 587;

const DEFAULT_FROM_ADDRESS: &str = "noreply@sellora.local";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    /// Prefix for relative download links, e.g. `https://sellora.example`.
    pub public_base_url: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable          | Required | Default                  |
    /// |-------------------|----------|--------------------------|
    /// | `SMTP_HOST`       | yes      | -                        |
    /// | `SMTP_PORT`       | no       | `587`                    |
    /// | `SMTP_FROM`       | no       | `noreply@sellora.local`  |
    /// | `SMTP_USER`       | no       | -                        |
    /// | `SMTP_PASSWORD`   | no       | -                        |
    /// | `PUBLIC_BASE_URL` | no       | -                        |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Subject and body of the notification for a job event.
pub fn render_notification(event: &PlatformEvent, public_base_url: Option<&str>) -> (String, String) {
    let job_id = event.job_id.as_deref().unwrap_or("unknown");
    let style = event.payload["style"].as_str().unwrap_or("your chosen");

    match event.event_type.as_str() {
        EVENT_JOB_COMPLETED => {
            let link = event.payload["downloadUrl"].as_str().unwrap_or_default();
            let link = match public_base_url {
                Some(base) if link.starts_with('/') => format!("{base}{link}"),
                _ => link.to_string(),
            };
            (
                "[Sellora] Your enhanced photo is ready".to_string(),
                format!(
                    "Your photo has been enhanced in the {style} style.\n\n\
                     Job: {job_id}\nDownload: {link}\n"
                ),
            )
        }
        EVENT_JOB_FAILED => {
            let reason = event.payload["error"].as_str().unwrap_or("unknown error");
            (
                "[Sellora] Photo enhancement failed".to_string(),
                format!("We could not enhance your photo.\n\nJob: {job_id}\nReason: {reason}\n"),
            )
        }
        EVENT_JOB_CANCELLED => (
            "[Sellora] Photo enhancement cancelled".to_string(),
            format!("The enhancement job {job_id} was cancelled.\n"),
        ),
        other => (
            format!("[Sellora] {other}"),
            format!("Job: {job_id}\nTime: {}\n", event.timestamp),
        ),
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends notification emails via SMTP.
pub struct EmailDelivery {
    config: EmailConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDelivery {
    /// Build the SMTP transport (STARTTLS relay) for the given configuration.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            config,
        })
    }

    /// Send the notification for `event` to `to_email`.
    pub async fn deliver(&self, to_email: &str, event: &PlatformEvent) -> Result<(), EmailError> {
        let (subject, body) = render_notification(event, self.config.public_base_url.as_deref());

        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.mailer.send(email).await?;

        tracing::info!(
            to = to_email,
            job_id = event.job_id.as_deref().unwrap_or_default(),
            event_type = %event.event_type,
            "Notification email sent",
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_returns_none_without_smtp_host() {
        std::env::remove_var("SMTP_HOST");
        assert!(EmailConfig::from_env().is_none());
    }

    #[test]
    fn parse_address_rejects_garbage() {
        assert!(parse_address("buyer@example.com").is_ok());
        assert!(parse_address("  buyer@example.com ").is_ok());
        let err = parse_address("not-an-email").unwrap_err();
        assert!(err.to_string().contains("Email address parse error"));
    }

    #[test]
    fn completed_notification_links_the_output() {
        let event = PlatformEvent::new(EVENT_JOB_COMPLETED)
            .with_job("job-9")
            .with_payload(serde_json::json!({
                "style": "luxury",
                "downloadUrl": "/outputs/enhanced_a.png",
            }));

        let (subject, body) = render_notification(&event, Some("https://sellora.example"));
        assert!(subject.contains("ready"));
        assert!(body.contains("luxury"));
        assert!(body.contains("https://sellora.example/outputs/enhanced_a.png"));
        assert!(body.contains("job-9"));
    }

    #[test]
    fn failed_notification_carries_reason() {
        let event = PlatformEvent::new(EVENT_JOB_FAILED)
            .with_job("job-3")
            .with_payload(serde_json::json!({"error": "Analyzing image: unreadable"}));

        let (subject, body) = render_notification(&event, None);
        assert!(subject.contains("failed"));
        assert!(body.contains("Analyzing image: unreadable"));
    }
}
