pub mod cache;
pub mod circuit_breaker;
pub mod rate_limiter;
pub mod retry;

pub use cache::{fingerprint, normalize_url, should_cache, CacheStats, ResultCache};
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use rate_limiter::{domain_of, DomainRateLimiter, RateLimitStats};
pub use retry::RetryPolicy;

use futures::stream::{self, StreamExt};
use std::future::Future;

use crate::core::config::ScoutConfig;
use crate::core::error::GenerationError;

/// Outcome for one input of [`ResilienceController::batch_with_partial_results`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<I, T> {
    pub item: I,
    pub result: Result<T, GenerationError>,
}

/// Retry with backoff around a keyed circuit breaker.
///
/// Every attempt goes through the breaker, so a circuit that opens halfway
/// through a retry loop stops it with [`GenerationError::CircuitOpen`],
/// which is never retried.
#[derive(Debug)]
pub struct ResilienceController {
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResilienceController {
    pub fn new(breaker: CircuitBreaker, retry: RetryPolicy) -> Self {
        Self { breaker, retry }
    }

    pub fn from_config(config: &ScoutConfig) -> Self {
        Self::new(
            CircuitBreaker::from_config(&config.resilience),
            RetryPolicy::from_config(&config.generation, &config.resilience),
        )
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub async fn execute<F, Fut, T>(&self, key: &str, mut op: F) -> Result<T, GenerationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        self.retry
            .run(key, || self.breaker.call(key, op()))
            .await
    }

    /// Run every item through [`Self::execute`] with at most `concurrency` in
    /// flight. One outcome per item, in input order; a failing item never
    /// stops its siblings.
    pub async fn batch_with_partial_results<I, K, F, Fut, T>(
        &self,
        items: Vec<I>,
        concurrency: usize,
        key_of: K,
        op: F,
    ) -> Vec<BatchOutcome<I, T>>
    where
        I: Clone,
        K: Fn(&I) -> String,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let op = &op;
        let mut outcomes: Vec<(usize, BatchOutcome<I, T>)> = stream::iter(items.into_iter().enumerate())
            .map(|(idx, item)| {
                let key = key_of(&item);
                async move {
                    let result = self.execute(&key, || op(item.clone())).await;
                    (idx, BatchOutcome { item, result })
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(idx, _)| *idx);
        outcomes.into_iter().map(|(_, o)| o).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn controller(threshold: u32, attempts: u32) -> ResilienceController {
        ResilienceController::new(
            CircuitBreaker::new(threshold, Duration::from_secs(30)),
            RetryPolicy::new(attempts, Duration::from_millis(10), false),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn retries_stop_once_the_circuit_opens() {
        let rc = controller(2, 5);
        let calls = AtomicU32::new(0);

        let out: Result<(), _> = rc
            .execute("flaky.test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GenerationError::Network("refused".into())) }
            })
            .await;

        assert!(out.unwrap_err().is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(rc.breaker().state("flaky.test"), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_within_the_retry_budget() {
        let rc = controller(5, 3);
        let calls = AtomicU32::new(0);

        let out = rc
            .execute("ok.test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(GenerationError::Timeout)
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(out, Ok(1));
        assert_eq!(rc.breaker().consecutive_failures("ok.test"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_keeps_every_item_in_order() {
        let rc = controller(10, 2);
        let items = vec![1u32, 2, 3, 4, 5];

        let outcomes = rc
            .batch_with_partial_results(
                items.clone(),
                2,
                |n| format!("host{}.test", n),
                |n| async move {
                    if n == 3 {
                        Err(GenerationError::Parse("bad page".into()))
                    } else {
                        tokio::time::sleep(Duration::from_millis(u64::from(10 - n))).await;
                        Ok(n * 10)
                    }
                },
            )
            .await;

        assert_eq!(outcomes.len(), items.len());
        let order: Vec<u32> = outcomes.iter().map(|o| o.item).collect();
        assert_eq!(order, items);
        assert_eq!(outcomes[0].result, Ok(10));
        assert_eq!(
            outcomes[2].result,
            Err(GenerationError::Parse("bad page".into()))
        );
        assert_eq!(outcomes[4].result, Ok(50));
    }
}
