//! Per-domain fixed-window throttling.
//!
//! Every domain owns a window `{window_start, count_in_window}`. A caller is
//! admitted while `count_in_window < max_requests`; otherwise it waits for the
//! window to roll over. Waiters line up on a fair async mutex, so they are
//! released in arrival order and two callers can never both take the last slot.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::core::config::RateLimitConfig;

/// A 429 never blocks a domain for longer than this many windows.
const MAX_PENALTY_WINDOWS: u32 = 64;

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    count_in_window: u32,
    strikes: u32,
    blocked_until: Option<Instant>,
}

#[derive(Debug)]
struct DomainSlot {
    /// FIFO queue of callers waiting for a permit.
    turnstile: tokio::sync::Mutex<()>,
    state: Mutex<WindowState>,
    queued: AtomicUsize,
}

impl DomainSlot {
    fn new() -> Self {
        Self {
            turnstile: tokio::sync::Mutex::new(()),
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                count_in_window: 0,
                strikes: 0,
                blocked_until: None,
            }),
            queued: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Nothing queued, no strikes and the window has lapsed: indistinguishable
    /// from a fresh slot.
    fn is_idle(&self, now: Instant, window: Duration) -> bool {
        if self.queued.load(Ordering::SeqCst) > 0 {
            return false;
        }
        let state = self.state();
        state.strikes == 0
            && state.blocked_until.map_or(true, |until| now >= until)
            && now >= state.window_start + window
    }
}

/// Keeps the `queued` counter honest when an `acquire` future is dropped.
struct QueuedGuard<'a>(&'a AtomicUsize);

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    pub count_in_window: u32,
    pub queued: usize,
    pub strikes: u32,
}

#[derive(Debug)]
pub struct DomainRateLimiter {
    enabled: bool,
    max_requests: u32,
    window: Duration,
    domains: Mutex<HashMap<String, Arc<DomainSlot>>>,
}

impl DomainRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            enabled: true,
            max_requests: max_requests.max(1),
            window,
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(config.max_requests, Duration::from_millis(config.window_ms))
        }
    }

    /// A limiter that admits everything immediately.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(1, Duration::ZERO)
        }
    }

    fn slot(&self, domain: &str) -> Arc<DomainSlot> {
        let key = domain.to_ascii_lowercase();
        let mut domains = self.domains.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = domains.get(&key) {
            return Arc::clone(slot);
        }

        // New domain: sweep slots nobody holds that have gone idle.
        let now = Instant::now();
        let before = domains.len();
        domains.retain(|_, slot| Arc::strong_count(slot) > 1 || !slot.is_idle(now, self.window));
        if domains.len() < before {
            debug!("dropped {} idle rate-limit slots", before - domains.len());
        }

        let slot = Arc::new(DomainSlot::new());
        domains.insert(key, Arc::clone(&slot));
        slot
    }

    fn existing_slot(&self, domain: &str) -> Option<Arc<DomainSlot>> {
        let domains = self.domains.lock().unwrap_or_else(PoisonError::into_inner);
        domains.get(&domain.to_ascii_lowercase()).cloned()
    }

    /// Wait until `domain` has a free slot in its current window, then take it.
    pub async fn acquire(&self, domain: &str) {
        if !self.enabled {
            return;
        }
        let slot = self.slot(domain);
        slot.queued.fetch_add(1, Ordering::SeqCst);
        let _queued = QueuedGuard(&slot.queued);
        let _turn = slot.turnstile.lock().await;

        loop {
            let wake_at = {
                let mut state = slot.state();
                let now = Instant::now();

                match state.blocked_until {
                    Some(until) if now < until => Some(until),
                    _ => {
                        state.blocked_until = None;
                        if now >= state.window_start + self.window {
                            state.window_start = now;
                            state.count_in_window = 0;
                        }
                        if state.count_in_window < self.max_requests {
                            state.count_in_window += 1;
                            None
                        } else {
                            Some(state.window_start + self.window)
                        }
                    }
                }
            };

            match wake_at {
                None => return,
                Some(at) => {
                    debug!(
                        "rate limit reached for {}, queued ({} waiting)",
                        domain,
                        slot.queued.load(Ordering::SeqCst)
                    );
                    sleep_until(at).await;
                }
            }
        }
    }

    /// Acquire a permit for `domain`, then run `f`.
    pub async fn execute<F, Fut, T>(&self, domain: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire(domain).await;
        f().await
    }

    /// Run `(domain, task)` pairs with at most `concurrency` in flight overall,
    /// on top of the per-domain limits. Results come back in input order.
    pub async fn execute_batch<F, Fut, T>(&self, tasks: Vec<(String, F)>, concurrency: usize) -> Vec<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut indexed: Vec<(usize, T)> = stream::iter(tasks.into_iter().enumerate())
            .map(|(idx, (domain, f))| async move { (idx, self.execute(&domain, f).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, v)| v).collect()
    }

    /// Record an HTTP 429 from `domain`: block it for
    /// `window × 2^(strikes-1)`, capped at [`MAX_PENALTY_WINDOWS`] windows.
    pub fn penalize(&self, domain: &str) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let slot = self.slot(domain);
        let mut state = slot.state();
        state.strikes = state.strikes.saturating_add(1);
        let factor = 2u32
            .saturating_pow(state.strikes - 1)
            .min(MAX_PENALTY_WINDOWS);
        let block = self.window * factor;
        state.blocked_until = Some(Instant::now() + block);
        warn!(
            "{} answered 429 (strike {}), backing off for {:?}",
            domain, state.strikes, block
        );
        block
    }

    /// A successful request clears any 429 strikes for the domain.
    pub fn report_success(&self, domain: &str) {
        if let Some(slot) = self.existing_slot(domain) {
            let mut state = slot.state();
            if state.strikes > 0 {
                debug!("clearing {} rate-limit strikes for {}", state.strikes, domain);
            }
            state.strikes = 0;
            state.blocked_until = None;
        }
    }

    /// Number of domains with a live slot.
    pub fn tracked_domains(&self) -> usize {
        self.domains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn stats(&self, domain: &str) -> RateLimitStats {
        let Some(slot) = self.existing_slot(domain) else {
            return RateLimitStats::default();
        };
        let state = slot.state();
        let live = Instant::now() < state.window_start + self.window;
        RateLimitStats {
            count_in_window: if live { state.count_in_window } else { 0 },
            queued: slot.queued.load(Ordering::SeqCst),
            strikes: state.strikes,
        }
    }
}

/// Host part of a URL, used as the rate-limit and circuit key.
pub fn domain_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}
