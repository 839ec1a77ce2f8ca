//! Sellora event bus and email delivery.
//!
//! - [`EventBus`]: in-process publish/subscribe hub for job lifecycle
//!   events, backed by `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the event envelope.
//! - [`delivery::email`]: SMTP delivery of job notifications.

pub mod bus;
pub mod delivery;

pub use bus::{EventBus, PlatformEvent};
pub use delivery::email::{EmailConfig, EmailDelivery, EmailError};
