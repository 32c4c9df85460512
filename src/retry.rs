//! Generic async helpers: retry with exponential backoff and bounded polling.
//!
//! Nothing in this module knows about the Supernet; the helpers are generic
//! over the operation's error type.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Options for [`retry`] / [`retry_with`].
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Total attempts including the first one (default 3).
    pub max_attempts: u32,

    /// Delay before the first retry (default 1 s).
    pub initial_delay: Duration,

    /// Upper bound on any single delay (default 10 s).
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each failed attempt (default 2).
    pub backoff_factor: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        }
    }
}

impl RetryOptions {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }
}

/// Retry `operation` with exponential backoff.
///
/// The final attempt's failure propagates unchanged. With
/// `max_attempts = 1` a failure propagates immediately with zero delay.
pub async fn retry<T, E, F, Fut>(operation: F, options: &RetryOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with(operation, options, |_, _| {}).await
}

/// Like [`retry`], invoking `on_retry(attempt_number, &error)` after each
/// failed attempt that will be retried (so never for the final failure).
pub async fn retry_with<T, E, F, Fut, C>(
    mut operation: F,
    options: &RetryOptions,
    mut on_retry: C,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(u32, &E),
{
    let max_attempts = options.max_attempts.max(1);
    let mut delay = options.initial_delay.min(options.max_delay);

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt == max_attempts {
                    return Err(err);
                }
                on_retry(attempt, &err);
                tokio::time::sleep(delay).await;
                delay = delay.mul_f64(options.backoff_factor).min(options.max_delay);
            }
        }
    }
    unreachable!("loop either returns a value or the final error")
}

/// Poll `condition` every `interval` until it holds or `deadline` elapses.
/// Returns whether the condition was met.
pub async fn poll_until<F>(mut condition: F, interval: Duration, deadline: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    loop {
        if condition() {
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
