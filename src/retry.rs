//! Exponential backoff for transient provider errors.
//!
//! Shared by the embedding and chat providers: base delay 1 s, factor
//! 2, at most 5 retries. Only errors the caller classifies as
//! transient are retried; everything else propagates immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Backoff policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied per retry.
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given retry cap and the default
    /// delay curve.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.factor.saturating_pow(attempt)
    }
}

/// Runs `op`, retrying transient failures with exponential backoff.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-transient error immediately.
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    policy: RetryPolicy,
    is_transient: C,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    error = %err,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "transient provider error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
