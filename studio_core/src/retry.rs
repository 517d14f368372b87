// Retry with exponential backoff for transient service failures.
// Only errors classified as unavailable are retried; everything else surfaces at once.

use std::time::Duration;

use crate::error::ServiceError;
use crate::service::{ServiceFuture, Timer};
use crate::types::RetrySettings;

/// Upper bound on a single backoff delay.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Retry policy: `max_retries` extra attempts, waiting `base_delay * 2^n` before retry n.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        RetryPolicy::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let base_ms = self.base_delay.as_millis().min(u64::MAX as u128) as u64;
        let multiplier = 1_u64 << retry.min(16);
        Duration::from_millis(base_ms.saturating_mul(multiplier).min(MAX_BACKOFF_MS))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        RetryPolicy::new(
            settings.max_retries,
            Duration::from_millis(settings.base_delay_ms),
        )
    }
}

/// Run `op`, retrying transient failures according to `policy`.
///
/// `op` is called once per attempt and must build a fresh request each time.
/// The last error is returned when retries run out.
pub async fn with_retry<'a, T, F, C>(
    policy: &RetryPolicy,
    timer: &C,
    label: &str,
    mut op: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> ServiceFuture<'a, T>,
    C: Timer + ?Sized,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retry < policy.max_retries => {
                let delay = policy.delay(retry);
                log::warn!(
                    "{} failed ({}), retry {}/{} in {}ms",
                    label,
                    err,
                    retry + 1,
                    policy.max_retries,
                    delay.as_millis()
                );
                timer.sleep(delay).await;
                retry += 1;
            }
            Err(err) => {
                log::debug!("{} failed after {} retries: {}", label, retry, err);
                return Err(err);
            }
        }
    }
}
