//! Per-handle call pacing.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces successive calls through one namespace handle by at least
/// `min_interval`.
///
/// The lock is held for the whole call, so calls through one handle are
/// serialized and never reordered. Different handles pace independently.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call_at: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call_at: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Delay still owed before a call may be dispatched.
    fn owed(&self, last: Option<Instant>, now: Instant) -> Duration {
        match last {
            Some(prev) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(prev)),
            None => Duration::ZERO,
        }
    }

    /// Run `call` once the interval since the previous dispatch has passed.
    pub async fn run<F, Fut, T>(&self, call: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut last = self.last_call_at.lock().await;
        if self.min_interval.is_zero() {
            return call().await;
        }

        let wait = self.owed(*last, Instant::now());
        if !wait.is_zero() {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limiter delaying call");
            tokio::time::sleep(wait).await;
        }
        let now = Instant::now();
        // Monotonic clock, but never let the mark move backwards.
        *last = Some(match *last {
            Some(prev) if prev > now => prev,
            _ => now,
        });
        call().await
    }
}
