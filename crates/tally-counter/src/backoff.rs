//! Retry backoff policy.
//!
//! Delays grow exponentially with the attempt number and carry a random
//! jitter so concurrent writers contending on the same shard cell do not
//! retry in lockstep.

use std::time::Duration;

use rand::Rng;

/// Randomized, capped exponential backoff.
///
/// For attempt `n`, the wait is `(base * jitter + floor) * 2^(n-1)` clamped
/// to `cap`, with `jitter` drawn uniformly from `[0.8, 1.5]` per call.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Nominal delay before jitter.
    pub base: Duration,
    /// Fixed minimum added to every jittered delay.
    pub floor: Duration,
    /// Upper bound on any single wait.
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(50),
            floor: Duration::from_millis(10),
            cap: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Compute the wait duration for the given attempt (1-based).
    pub fn wait_time(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let jitter = rand::rng().random_range(0.8..=1.5);
        let seed = self.base.as_secs_f64() * jitter + self.floor.as_secs_f64();
        let grown = seed * 2f64.powi((attempt - 1).min(63) as i32);
        Duration::from_secs_f64(grown.min(self.cap.as_secs_f64()))
    }

    /// Sleep for the computed wait of the given attempt.
    pub async fn wait(&self, attempt: u32) {
        tokio::time::sleep(self.wait_time(attempt)).await;
    }
}
