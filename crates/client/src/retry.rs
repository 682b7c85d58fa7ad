//! Bounded retry of transient transport failures.

use std::future::Future;

use cdp_domain::error::{Error, Result};

/// How many times a single remote call may be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// `max_attempts` below one is raised to one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// * Success returns immediately.
    /// * Only [`Error::is_transient`] failures are retried; any other error
    ///   (notably a remote fault from a mutating call) is returned on first
    ///   occurrence.
    /// * When attempts are exhausted the last transient error is returned.
    ///
    /// `op` receives the 1-based attempt number. `on_retry` is told about
    /// each failure that will be retried.
    pub async fn run<T, F, Fut, R>(&self, mut op: F, mut on_retry: R) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        R: FnMut(u32, &Error),
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    on_retry(attempt, &e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
