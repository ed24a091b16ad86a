//! Bounded retry with a fixed delay for analysis attempts.
//!
//! Only analysis is retried. Every failed attempt except the last is followed
//! by the same pause, so the worst case for one item is
//! `(max_attempts - 1) * delay` of waiting on top of the attempts themselves.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use concall_core::pipeline::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(2));
//!
//! match policy.should_retry(1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

/// Default number of analysis attempts per item.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause after a failed attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Decision after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// The attempt about to be made (1-indexed, so the first retry is 2).
        attempt: u32,
    },

    /// Give up on this item.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Attempt bound and fixed inter-attempt delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Maximum attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Decides what follows the failure of attempt number `attempt` (1-indexed).
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}
