//! Whole-attempt retry with linear backoff.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// Run `operation(attempt)` until it succeeds or `max_attempts` is spent.
///
/// Attempts are numbered from 1. After failed attempt `n` (when another
/// follows) the wait is `base_delay * n`. A `max_attempts` of 0 is treated
/// as 1. Returns the last attempt's error.
pub async fn with_retry<T, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                tracing::warn!(attempt, max_attempts, "final attempt failed: {e:#}");
                return Err(e);
            }
            Err(e) => {
                let delay = base_delay * attempt;
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying: {e:#}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
