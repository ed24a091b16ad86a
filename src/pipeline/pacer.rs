//! Fixed pause between consecutive processed items.
//!
//! The pause is measured from the end of the previous item, so it applies
//! regardless of whether that item succeeded or failed. The first item
//! starts immediately.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

/// Warn once waiting alone has taken this long in one run.
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(300);

/// Spaces out outbound work item by item.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    last_finished: Option<Instant>,
    cumulative: Duration,
    warned: bool,
}

impl Pacer {
    /// Creates a pacer with the given inter-item delay.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_finished: None,
            cumulative: Duration::ZERO,
            warned: false,
        }
    }

    /// Configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Total time spent waiting so far.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        self.cumulative
    }

    /// Waits until `delay` has passed since the previous item finished.
    pub async fn wait(&mut self) {
        let Some(last) = self.last_finished else {
            return;
        };
        let ready_at = last + self.delay;
        let now = Instant::now();
        if ready_at <= now {
            return;
        }

        let wait = ready_at - now;
        debug!(delay_ms = wait.as_millis(), "pacing before next item");
        tokio::time::sleep_until(ready_at).await;

        self.cumulative += wait;
        if !self.warned && self.cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
            self.warned = true;
            warn!(
                cumulative_secs = self.cumulative.as_secs(),
                "pacing has added significant delay to this run"
            );
        }
    }

    /// Records that an item just finished.
    pub fn finished(&mut self) {
        self.last_finished = Some(Instant::now());
    }
}
