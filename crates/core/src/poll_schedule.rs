//! Client-side poll schedule.
//!
//! A tracked job moves through three phases based on the time elapsed since
//! tracking started:
//!
//! | Phase           | From                   | Delay between polls                         |
//! |-----------------|------------------------|---------------------------------------------|
//! | `Responsive`    | start                  | `base_delay`                                |
//! | `Backoff`       | `backoff_after`        | `base_delay * growth_factor ^ polls`, capped |
//! | `EmailFallback` | `email_fallback_after` | same as `Backoff`; email offered once       |

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunable parameters for the poll schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay between polls in the responsive phase, and the backoff base.
    pub base_delay: Duration,
    /// Factor by which the delay grows per completed poll once backing off.
    pub growth_factor: f64,
    /// Upper bound on the delay between polls.
    pub max_delay: Duration,
    /// Elapsed time after which polling backs off.
    pub backoff_after: Duration,
    /// Elapsed time after which the email fallback is offered.
    pub email_fallback_after: Duration,
    /// Delay before retrying after a transient failure.
    pub retry_delay: Duration,
    /// Consecutive transient failures before the user is warned.
    pub max_consecutive_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            growth_factor: 1.5,
            max_delay: Duration::from_secs(30),
            backoff_after: Duration::from_secs(90),
            email_fallback_after: Duration::from_secs(180),
            retry_delay: Duration::from_secs(5),
            max_consecutive_failures: 5,
        }
    }
}

/// Phase of the poll schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    Responsive,
    Backoff,
    EmailFallback,
}

impl PollConfig {
    /// Phase for the given time since tracking started.
    pub fn phase(&self, elapsed: Duration) -> PollPhase {
        if elapsed >= self.email_fallback_after {
            PollPhase::EmailFallback
        } else if elapsed >= self.backoff_after {
            PollPhase::Backoff
        } else {
            PollPhase::Responsive
        }
    }

    /// Delay before the next poll, given the elapsed time and the number of
    /// polls completed so far.
    ///
    /// Never exceeds [`PollConfig::max_delay`] and is non-decreasing in
    /// `polls` once past `backoff_after`.
    pub fn next_delay(&self, elapsed: Duration, polls: u32) -> Duration {
        match self.phase(elapsed) {
            PollPhase::Responsive => self.base_delay.min(self.max_delay),
            PollPhase::Backoff | PollPhase::EmailFallback => self.backoff_delay(polls),
        }
    }

    fn backoff_delay(&self, polls: u32) -> Duration {
        let exponent = i32::try_from(polls).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.growth_factor.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}
