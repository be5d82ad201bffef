use backoff::future::retry_notify;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::core::config::{GenerationConfig, ResilienceConfig};
use crate::core::error::GenerationError;

/// Exponential backoff retry: delay `base × 2^attempt`, optionally jittered,
/// at most `max_attempts` calls in total. Only
/// [`GenerationError::is_retryable`] failures are tried again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, jitter: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter,
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, false)
    }

    pub fn from_config(generation: &GenerationConfig, resilience: &ResilienceConfig) -> Self {
        if !generation.retry_on_fail {
            return Self::none();
        }
        Self::new(
            generation.max_retries,
            Duration::from_millis(resilience.base_delay_ms),
            resilience.jitter,
        )
    }

    fn backoff(&self) -> ExponentialBackoff {
        let ceiling = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(self.max_attempts.min(16)));
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(if self.jitter { 0.5 } else { 0.0 })
            .with_max_interval(ceiling)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Call `op` until it succeeds, fails permanently or runs out of attempts.
    pub async fn run<F, Fut, T>(&self, label: &str, mut op: F) -> Result<T, GenerationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let max = self.max_attempts;
        let mut attempt = 0u32;

        retry_notify(
            self.backoff(),
            || {
                attempt += 1;
                let current = attempt;
                let fut = op();
                async move {
                    match fut.await {
                        Ok(v) => Ok(v),
                        Err(e) if e.is_retryable() && current < max => {
                            Err(backoff::Error::transient(e))
                        }
                        Err(e) => Err(backoff::Error::permanent(e)),
                    }
                }
            },
            |err: GenerationError, wait: Duration| {
                warn!("{} failed ({}), retrying in {:?}", label, err, wait);
            },
        )
        .await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), true)
    }
}
