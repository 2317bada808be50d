//! Response cache for generated completions.
//!
//! [`ResponseCache`] sits in front of the model engine as a
//! read-through / write-through layer. A hit bypasses the engine (and
//! its generation lock) entirely; a miss is generated and written back
//! under the same fingerprint. Hit/miss metrics are emitted per
//! operation.
//!
//! Functional correctness needs no eviction — the fingerprint keying
//! alone is what matters — but a long-running service must not grow
//! without bound, so the store is moka's LRU + TTL cache with the same
//! defaults the rest of our services use (10 000 entries, 1 hour).
//!
//! Concurrency: moka gives lock-free concurrent access; get/set on
//! distinct keys never block each other, and a same-key race is
//! last-write-wins, which is fine for deterministic-enough completions.

use std::time::Duration;

use moka::future::Cache;

use crate::telemetry;

use super::fingerprint::Fingerprint;

/// Configuration for the response cache.
///
/// ```rust
/// # use muninn::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(10_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached completions. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached completions. Default: 1 hour.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached completions.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached completions.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// In-memory completion cache keyed on request fingerprints.
///
/// Cloning is cheap: clones share the same underlying store.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, String>,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { cache }
    }

    /// Look up a cached completion.
    ///
    /// Returns `None` on cache miss. Emits hit/miss metrics labelled
    /// with `operation`.
    pub async fn get(&self, fingerprint: &Fingerprint, operation: &'static str) -> Option<String> {
        match self.cache.get(fingerprint.as_str()).await {
            Some(text) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation)
                    .increment(1);
                Some(text)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation)
                    .increment(1);
                None
            }
        }
    }

    /// Insert (or overwrite) a completion under its fingerprint.
    pub async fn insert(&self, fingerprint: &Fingerprint, text: &str) {
        self.cache
            .insert(fingerprint.as_str().to_string(), text.to_string())
            .await;
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
