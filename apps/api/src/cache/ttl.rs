//! Time-bounded key/value cache with a single global TTL.
//!
//! Expiry happens two ways: lazily on `get` and in bulk via
//! `evict_expired_except`.
//! Both go through [`TtlCache::is_fresh`] so they never disagree about an entry.
//!
//! Timestamps use `tokio::time::Instant`, which follows the runtime clock and
//! can be paused/advanced in tests.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::info;

struct CacheEntry<V> {
    value: V,
    written_at: Instant,
}

pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns the value for `key` if it was written less than `ttl` ago.
    /// Stale entries are reported as absent but left for the sweep.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| self.is_fresh(entry.written_at, now))
            .map(|entry| entry.value.clone())
    }

    /// Overwrites the value and timestamp for `key`.
    pub fn set(&self, key: &str, value: V) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                written_at: Instant::now(),
            },
        );
        info!(key, action = "set", "Cache updated");
    }

    /// Returns the value for `key` regardless of age.
    pub fn get_stale(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Removes every entry whose age has reached `ttl`, except those listed in
    /// `retain`. Returns how many were removed.
    pub fn evict_expired_except(&self, retain: &[String]) -> usize {
        let now = Instant::now();
        let mut evicted = 0usize;
        self.entries.retain(|key, entry| {
            let keep = self.is_fresh(entry.written_at, now) || retain.contains(key);
            if !keep {
                evicted += 1;
                info!(key = %key, action = "evict", "Expired cache entry cleared");
            }
            keep
        });
        evicted
    }

    /// Number of stored entries, including stale ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_fresh(&self, written_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(written_at) < self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(1800);

    #[tokio::test(start_paused = true)]
    async fn test_value_visible_before_ttl() {
        let cache = TtlCache::new(TTL);
        cache.set("posts_cache", json!([{"_id": "1", "date": "2024-01-01"}]));

        advance(Duration::from_secs(1000)).await;
        assert_eq!(
            cache.get("posts_cache"),
            Some(json!([{"_id": "1", "date": "2024-01-01"}]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_absent_at_exactly_ttl() {
        let cache = TtlCache::new(TTL);
        cache.set("posts_cache", json!([]));

        advance(TTL - Duration::from_millis(1)).await;
        assert!(cache.get("posts_cache").is_some());

        advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("posts_cache"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_does_not_remove_stale_entry() {
        let cache: TtlCache<Value> = TtlCache::new(TTL);
        cache.set("events_cache", json!([1]));
        advance(TTL).await;

        assert_eq!(cache.get("events_cache"), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_twice_refreshes_window() {
        let cache = TtlCache::new(TTL);
        cache.set("k", 1);
        advance(Duration::from_secs(1000)).await;
        cache.set("k", 1);
        advance(Duration::from_secs(1000)).await;

        // 2000s after the first write, 1000s after the second.
        assert_eq!(cache.get("k"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_expired_removes_only_stale_entries() {
        let cache = TtlCache::new(TTL);
        cache.set("old", 1);
        advance(Duration::from_secs(1000)).await;
        cache.set("young", 2);
        advance(Duration::from_secs(800)).await;

        assert_eq!(cache.evict_expired_except(&[]), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("old"), None);
        assert_eq!(cache.get("young"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_and_get_agree_on_boundary() {
        let cache = TtlCache::new(TTL);
        cache.set("k", 1);
        advance(TTL).await;

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.evict_expired_except(&[]), 1);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retained_keys_survive_sweep() {
        let cache = TtlCache::new(TTL);
        cache.set("posts_cache", 1);
        cache.set("events_cache", 2);
        advance(TTL).await;

        assert_eq!(cache.evict_expired_except(&["posts_cache".to_string()]), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("posts_cache"), None);
        assert_eq!(cache.get_stale("posts_cache"), Some(1));
        assert_eq!(cache.get_stale("events_cache"), None);
    }

    #[test]
    fn test_missing_key_is_absent() {
        let cache: TtlCache<u8> = TtlCache::new(TTL);
        assert_eq!(cache.get("nope"), None);
        assert_eq!(cache.get_stale("nope"), None);
        assert_eq!(cache.evict_expired_except(&[]), 0);
    }
}
