//! Transfer-rate ceiling for the streaming loop.
//!
//! The [`Throttle`] keeps the *average* rate of a transfer at or below a cap.
//! It is consulted on block boundaries only, so a single block can overshoot;
//! the following sleep pulls the running average back down to the cap.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mediadl_core::download::Throttle;
//! use mediadl_core::config::RateLimit;
//!
//! let throttle = Throttle::new(Some(RateLimit::new(1024.0).unwrap()));
//! // 2 KiB after half a second at 1 KiB/s means 1.5 s of catching up.
//! assert_eq!(
//!     throttle.delay_for(2048, Duration::from_millis(500)),
//!     Duration::from_millis(1500)
//! );
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use crate::config::RateLimit;

/// Average-rate limiter for a single transfer session.
#[derive(Debug, Clone, Copy, Default)]
pub struct Throttle {
    /// Cap in bytes per second, `None` when unlimited.
    limit: Option<RateLimit>,
}

impl Throttle {
    /// Creates a throttle with an optional cap.
    #[must_use]
    pub fn new(limit: Option<RateLimit>) -> Self {
        Self { limit }
    }

    /// Creates a throttle that never delays.
    #[must_use]
    pub fn disabled() -> Self {
        Self { limit: None }
    }

    #[cfg(test)]
    fn is_disabled(&self) -> bool {
        self.limit.is_none_or(|limit| limit.bytes_per_second() == 0.0)
    }

    /// Computes how long to sleep so that `bytes` over `elapsed` plus the
    /// sleep averages out to the cap.
    ///
    /// No delay without a cap, before the first byte, or while the achieved
    /// average is at or below the cap.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn delay_for(&self, bytes: u64, elapsed: Duration) -> Duration {
        let Some(limit) = self.limit else {
            return Duration::ZERO;
        };
        let cap = limit.bytes_per_second();
        if bytes == 0 || cap <= 0.0 {
            return Duration::ZERO;
        }
        let elapsed_secs = elapsed.as_secs_f64();
        let bytes = bytes as f64;
        if elapsed_secs > 0.0 && bytes / elapsed_secs <= cap {
            return Duration::ZERO;
        }
        let desired = bytes / cap;
        let sleep = desired - elapsed_secs;
        if sleep <= 0.0 || !sleep.is_finite() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(sleep)
    }

    /// Sleeps for [`delay_for`](Self::delay_for), if anything.
    #[instrument(level = "trace", skip(self))]
    pub async fn wait(&self, bytes: u64, elapsed: Duration) {
        let delay = self.delay_for(bytes, elapsed);
        if delay.is_zero() {
            return;
        }
        debug!(delay_ms = delay.as_millis(), bytes, "throttling transfer");
        tokio::time::sleep(delay).await;
    }
}
