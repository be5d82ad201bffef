use lru::LruCache;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::core::config::CacheConfig;
use crate::types::SchemaType;

/// Schema types whose output is stable enough to be worth reusing.
pub const CACHEABLE_TYPES: &[&str] = &[
    "Product",
    "Article",
    "NewsArticle",
    "BlogPosting",
    "LocalBusiness",
    "Restaurant",
    "Store",
    "Event",
    "Recipe",
    "VideoObject",
    "WebPage",
    "Organization",
    "Person",
];

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
    pub evictions: u64,
    pub expirations: u64,
}

struct Inner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V> Inner<V> {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| now > e.expires_at)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }
}

/// In-memory TTL + LRU cache shared by every pipeline invocation.
///
/// Expiry is lazy: an entry past its deadline is dropped the next time it is
/// looked up (or on [`ResultCache::purge_expired`]). When an insert would grow
/// the cache past `max_size`, expired entries are purged first and then the
/// least recently accessed entry goes.
pub struct ResultCache<V> {
    ttl: Duration,
    max_size: usize,
    inner: Mutex<Inner<V>>,
}

impl<V> std::fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl<V: Clone> ResultCache<V> {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        // A zero-sized cache never stores anything; `put` short-circuits.
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            max_size,
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        if config.storage != "memory" {
            tracing::warn!(
                "cache storage '{}' is not supported, using in-memory cache",
                config.storage
            );
        }
        Self::new(Duration::from_millis(config.ttl), config.max_size)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.lock();

        match inner.entries.peek(key).map(|e| now > e.expires_at) {
            None => {
                inner.misses += 1;
                debug!("cache miss: {}", key);
                None
            }
            Some(true) => {
                inner.entries.pop(key);
                inner.expirations += 1;
                inner.misses += 1;
                debug!("cache entry expired: {}", key);
                None
            }
            Some(false) => {
                inner.hits += 1;
                debug!("cache hit: {}", key);
                inner.entries.get(key).map(|e| e.value.clone())
            }
        }
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        if self.max_size == 0 {
            return;
        }
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.lock();

        if !inner.entries.contains(&key) && inner.entries.len() >= self.max_size {
            inner.purge_expired(now);
            if inner.entries.len() >= self.max_size {
                if let Some((victim, _)) = inner.entries.pop_lru() {
                    inner.evictions += 1;
                    debug!("cache evicted: {}", victim);
                }
            }
        }

        inner.entries.push(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().entries.pop(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Drops every expired entry; returns how many went.
    pub fn purge_expired(&self) -> usize {
        self.lock().purge_expired(Instant::now())
    }

    /// Age of a live entry, mostly for diagnostics.
    pub fn age(&self, key: &str) -> Option<Duration> {
        self.lock()
            .entries
            .peek(key)
            .map(|e| Instant::now().saturating_duration_since(e.created_at))
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let lookups = inner.hits + inner.misses;
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
            size: inner.entries.len(),
            evictions: inner.evictions,
            expirations: inner.expirations,
        }
    }
}

// ─── key helpers ─────────────────────────────────────────────────────────────

/// Whether a generated schema is reusable enough to cache.
pub fn should_cache(schema: &Value) -> bool {
    let ty = match schema.get("@type") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Array(items)) => items.first().and_then(Value::as_str),
        _ => None,
    };
    ty.map(|t| CACHEABLE_TYPES.contains(&t)).unwrap_or(false)
}

/// Hex SHA-256 of the schema's JSON encoding.
///
/// `serde_json` objects serialize with sorted keys, so equal schemas always
/// produce the same fingerprint regardless of field insertion order.
pub fn fingerprint(schema: &Value) -> String {
    let bytes = serde_json::to_vec(schema).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// Cache key for a URL plus the type hints it was generated with.
///
/// Scheme and host are lowercased, default ports and fragments dropped, a
/// trailing `/` on non-root paths removed and query pairs sorted. Unparseable
/// input is used verbatim (trimmed).
pub fn normalize_url(raw: &str, target_types: &[SchemaType]) -> String {
    let base = match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);

            let path = url.path().to_string();
            if path.len() > 1 && path.ends_with('/') {
                url.set_path(path.trim_end_matches('/'));
            }

            let mut pairs: Vec<(String, String)> = url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if pairs.is_empty() {
                url.set_query(None);
            } else {
                pairs.sort();
                url.query_pairs_mut().clear().extend_pairs(pairs);
            }

            url.to_string()
        }
        Err(_) => raw.trim().to_string(),
    };

    if target_types.is_empty() {
        return base;
    }
    let mut hints: Vec<&str> = target_types.iter().map(|t| t.as_str()).collect();
    hints.sort_unstable();
    hints.dedup();
    format!("{}|types={}", base, hints.join(","))
}
