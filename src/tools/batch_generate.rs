use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::types::*;
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
    pub results: Vec<GenerationResult>,
}

/// Generate schemas for many URLs with bounded concurrency.
///
/// Exactly one result per input URL, in input order. A failing URL is
/// reported in its own slot and never disturbs its siblings. Once the batch
/// is cancelled or its deadline passes, pages already in flight finish but
/// no new URL is started; those come back as `cancelled`.
pub async fn generate_batch(
    state: &Arc<AppState>,
    urls: Vec<String>,
    opts: &BatchOptions,
) -> BatchReport {
    let start_time = Instant::now();
    let total = urls.len();
    let concurrency = opts
        .concurrency
        .unwrap_or(state.config.generation.concurrency)
        .max(1);
    let timeout_ms = opts
        .timeout_ms
        .unwrap_or(state.config.generation.timeout_ms);
    let deadline = (timeout_ms > 0)
        .then(|| tokio::time::Instant::now() + Duration::from_millis(timeout_ms));
    let cancel = opts.cancel.clone().unwrap_or_default();

    info!(
        "Starting batch generation of {} URLs (concurrency: {})",
        total, concurrency
    );

    let completed = AtomicUsize::new(0);
    let mut indexed: Vec<(usize, GenerationResult)> = stream::iter(urls.into_iter().enumerate())
        .map(|(idx, url)| {
            let state = Arc::clone(state);
            let cancel = cancel.clone();
            let completed = &completed;
            async move {
                let result = if stopped(&cancel, deadline) {
                    GenerationResult::cancelled(&url)
                } else {
                    match crate::generate::generate(&state, &url, &opts.generate).await {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("Rejected {}: {}", url, e);
                            GenerationResult::failure(&url, e.to_string())
                        }
                    }
                };

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(progress) = &opts.progress {
                    progress(&url, done, total);
                }
                (idx, result)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    indexed.sort_by_key(|(idx, _)| *idx);
    let results: Vec<GenerationResult> = indexed.into_iter().map(|(_, r)| r).collect();

    let successful = results.iter().filter(|r| r.success).count();
    let failed = total - successful;

    info!(
        "Batch generation completed: {}/{} successful, {} failed, {}ms total",
        successful,
        total,
        failed,
        start_time.elapsed().as_millis()
    );

    BatchReport {
        total,
        successful,
        failed,
        total_duration_ms: start_time.elapsed().as_millis() as u64,
        results,
    }
}

fn stopped(cancel: &CancellationToken, deadline: Option<tokio::time::Instant>) -> bool {
    cancel.is_cancelled()
        || deadline
            .map(|d| tokio::time::Instant::now() >= d)
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScoutConfig;
    use crate::core::error::GenerationError;
    use crate::scraping::{HtmlFetcher, StaticFetcher};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn page(title: &str) -> String {
        format!(
            "<html><head><title>{}</title></head><body><h1>{}</h1><p>Some text.</p></body></html>",
            title, title
        )
    }

    fn state() -> Arc<AppState> {
        let fetcher = StaticFetcher::new()
            .with_page("https://a.test/1", page("One"))
            .with_page("https://b.test/2", page("Two"))
            .with_error("https://c.test/3", GenerationError::Parse("garbage".into()))
            .with_page("https://a.test/4", page("Four"));
        Arc::new(AppState::with_fetcher(ScoutConfig::default(), Arc::new(fetcher)))
    }

    fn urls() -> Vec<String> {
        ["https://a.test/1", "https://b.test/2", "https://c.test/3", "not a url", "https://a.test/4"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn results_follow_input_order_with_isolated_failures() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let opts = BatchOptions {
            concurrency: Some(2),
            progress: Some(Arc::new(move |url: &str, done: usize, total: usize| {
                sink.lock().unwrap().push((url.to_string(), done, total));
            })),
            ..Default::default()
        };

        let report = generate_batch(&state(), urls(), &opts).await;

        assert_eq!(report.total, 5);
        let got: Vec<&str> = report.results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(got, urls());
        let ok: Vec<bool> = report.results.iter().map(|r| r.success).collect();
        assert_eq!(ok, vec![true, true, false, false, true]);
        assert_eq!(report.successful, 3);
        assert_eq!(report.failed, 2);
        assert!(report.results[2].error.as_deref().unwrap().contains("garbage"));
        assert!(report.results[3].error.as_deref().unwrap().contains("invalid URL"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        let mut counts: Vec<usize> = seen.iter().map(|(_, done, _)| *done).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2, 3, 4, 5]);
        assert!(seen.iter().all(|(_, _, total)| *total == 5));
    }

    #[tokio::test]
    async fn cancelled_batch_reports_every_url() {
        let token = CancellationToken::new();
        token.cancel();
        let opts = BatchOptions {
            cancel: Some(token),
            ..Default::default()
        };

        let report = generate_batch(&state(), urls(), &opts).await;
        assert_eq!(report.results.len(), 5);
        assert!(report
            .results
            .iter()
            .all(|r| !r.success && r.error.as_deref() == Some("cancelled")));
    }

    #[tokio::test]
    async fn cancelling_mid_batch_stops_dequeuing() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let opts = BatchOptions {
            concurrency: Some(1),
            cancel: Some(token),
            progress: Some(Arc::new(move |_: &str, done: usize, _: usize| {
                if done == 1 {
                    trigger.cancel();
                }
            })),
            ..Default::default()
        };

        let report = generate_batch(&state(), urls(), &opts).await;
        assert!(report.results[0].success);
        assert!(report.results[1..]
            .iter()
            .all(|r| r.error.as_deref() == Some("cancelled")));
    }

    /// Takes `delay` to answer every URL with the same page.
    struct SlowFetcher {
        delay: Duration,
    }

    #[async_trait]
    impl HtmlFetcher for SlowFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(self.delay).await;
            Ok(page("Slow"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_dequeuing_after_in_flight_work() {
        let fetcher = SlowFetcher {
            delay: Duration::from_millis(100),
        };
        let state = Arc::new(AppState::with_fetcher(ScoutConfig::default(), Arc::new(fetcher)));
        let opts = BatchOptions {
            concurrency: Some(1),
            timeout_ms: Some(50),
            ..Default::default()
        };

        let report = generate_batch(&state, urls(), &opts).await;

        assert_eq!(report.results.len(), 5);
        assert!(report.results[0].success);
        assert!(report.results[1..]
            .iter()
            .all(|r| !r.success && r.error.as_deref() == Some("cancelled")));
        assert_eq!(report.successful, 1);
    }

    #[tokio::test]
    async fn empty_batch() {
        let report = generate_batch(&state(), Vec::new(), &BatchOptions::default()).await;
        assert_eq!(report.total, 0);
        assert!(report.results.is_empty());
    }
}
