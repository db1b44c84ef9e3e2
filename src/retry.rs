//! Bounded retry combinator with pluggable backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Linear backoff: attempt N (1-based) waits `N * step` before the next try.
pub fn linear(step: Duration) -> impl Fn(u32) -> Duration {
    move |attempt| step * attempt
}

/// Run `op` up to `max_attempts` times, sleeping `backoff(attempt)` after each
/// failed attempt (1-based).
///
/// Intermediate failures are logged but not surfaced; only the final error
/// from the exhausted budget propagates. `max_attempts` of 0 is treated as 1.
pub async fn with_retry<T, E, F, Fut, B>(max_attempts: u32, backoff: B, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    B: Fn(u32) -> Duration,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts => {
                let delay = backoff(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, retrying: {err}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                warn!(attempt, max_attempts, "Final attempt failed: {err}");
                return Err(err);
            }
        }
    }
}
