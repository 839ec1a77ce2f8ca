//! Out-of-band job notifications.
//!
//! [`EmailSubscriptions`] records the addresses registered through
//! `POST /api/process/{id}/notify`; [`NotificationRouter`] consumes the event
//! bus and emails them once the job reaches a terminal state.

pub mod router;
pub mod subscriptions;

pub use router::NotificationRouter;
pub use subscriptions::EmailSubscriptions;
