//! Generic TTL cache.
//!
//! Wraps `moka::future::Cache` the way `elevation/service.rs` does, but
//! generalized to per-entry TTLs via a custom `Expiry` implementation instead
//! of two separate fixed-TTL caches, and to tri-state lookups
//! (absent / present-with-null / present-with-value) by storing `Option<V>`
//! as the cached value — `moka`'s own `Option` wrapper on `get()` then
//! composes directly into the three states this crate's negative-caching
//! callers need.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache as MokaCache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

struct PerEntryExpiry;

impl Expiry<String, (Value, Duration)> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(Value, Duration),
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub keys: u64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Async, TTL-bearing cache keyed by string, values serialized to JSON so a
/// single cache instance can back heterogeneous callers (flight lists,
/// trajectories, route lookups, elevation lookups).
pub struct Cache {
    inner: MokaCache<String, (Value, Duration)>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl Cache {
    pub fn new(max_capacity: u64) -> Arc<Self> {
        let inner = MokaCache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryExpiry)
            .build();

        Arc::new(Self {
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        })
    }

    /// Store `value` under `key` with the given TTL. Pass `None` to cache a
    /// negative result (a prior lookup that resolved to "nothing found").
    pub async fn set<T: Serialize>(&self, key: impl Into<String>, value: Option<&T>, ttl: Duration) {
        let json = match value {
            Some(v) => serde_json::to_value(v).unwrap_or(Value::Null),
            None => Value::Null,
        };
        self.inner.insert(key.into(), (json, ttl)).await;
        self.sets.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cache_sets_total").increment(1);
    }

    /// `None` = absent (never cached or expired). `Some(None)` = cached
    /// negative result. `Some(Some(v))` = cached value.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<Option<T>> {
        match self.inner.get(key).await {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("cache_misses_total").increment(1);
                None
            }
            Some((Value::Null, _)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("cache_hits_total").increment(1);
                Some(None)
            }
            Some((json, _)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("cache_hits_total").increment(1);
                match serde_json::from_value(json) {
                    Ok(v) => Some(Some(v)),
                    Err(_) => Some(None),
                }
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
        self.deletes.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cache_deletes_total").increment(1);
    }

    pub async fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks().await;
        CacheStats {
            keys: self.inner.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_key_returns_none() {
        let cache = Cache::new(100);
        assert!(cache.get::<String>("missing").await.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = Cache::new(100);
        cache.set("k", Some(&42_i64), Duration::from_secs(60)).await;
        let got: Option<Option<i64>> = cache.get("k").await;
        assert_eq!(got, Some(Some(42)));
    }

    #[tokio::test]
    async fn negative_cache_entry_is_present_but_none() {
        let cache = Cache::new(100);
        cache.set::<i64>("k", None, Duration::from_secs(60)).await;
        let got: Option<Option<i64>> = cache.get("k").await;
        assert_eq!(got, Some(None));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = Cache::new(100);
        cache.set("k", Some(&1_i64), Duration::from_secs(60)).await;
        cache.delete("k").await;
        let got: Option<Option<i64>> = cache.get("k").await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache = Cache::new(100);
        cache.set("k", Some(&1_i64), Duration::from_secs(60)).await;
        let _: Option<Option<i64>> = cache.get("k").await;
        let _: Option<Option<i64>> = cache.get("missing").await;
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
    }
}
