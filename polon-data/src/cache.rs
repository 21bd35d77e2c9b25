//! Short-TTL response memoization, keyed by request identity.
//!
//! Collapses repeated identical requests within the cache window so the
//! cascade never touches the network for them. Entries are interchangeable
//! for the same key within the TTL, so concurrent writes need no
//! lost-update protection: last writer wins.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Default memoization window.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Default entry cap before least-recently-inserted eviction kicks in.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    expires_at: Instant,
}

/// Process-wide TTL cache of upstream JSON responses.
///
/// Keys are the original target identity (not the transport stage that
/// carried the response). Payloads are cloned out at the boundary, so no
/// consumer ever aliases the stored value.
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    store: Mutex<IndexMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            store: Mutex::new(IndexMap::with_capacity(capacity.max(1))),
        }
    }

    /// Stored payload for `key`, if present and not expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let store = self.store.lock();
        match store.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => {
                trace!(key, "cache hit");
                Some(entry.payload.clone())
            }
            _ => {
                trace!(key, "cache miss");
                None
            }
        }
    }

    /// Store `payload` under `key` for `ttl`. Overwrites any previous entry
    /// and refreshes its insertion position.
    pub fn put(&self, key: impl Into<String>, payload: Value, ttl: Duration) {
        let key = key.into();
        let mut store = self.store.lock();

        store.shift_remove(&key);
        store.insert(
            key,
            CacheEntry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );

        while store.len() > self.capacity {
            store.shift_remove_index(0);
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    pub fn clear(&self) {
        self.store.lock().clear();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_miss_after() {
        let cache = ResponseCache::default();
        cache.put("k", json!({"price": 65000}), Duration::from_millis(1000));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(cache.get("k"), Some(json!({"price": 65000})));

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_can_be_overwritten() {
        let cache = ResponseCache::default();
        cache.put("k", json!(1), Duration::from_millis(10));

        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k"), None);

        cache.put("k", json!(2), Duration::from_millis(1000));
        assert_eq!(cache.get("k"), Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_writer_wins() {
        let cache = ResponseCache::default();
        cache.put("k", json!("first"), DEFAULT_TTL);
        cache.put("k", json!("second"), DEFAULT_TTL);
        assert_eq!(cache.get("k"), Some(json!("second")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_least_recently_inserted() {
        let cache = ResponseCache::new(2);
        cache.put("a", json!(1), DEFAULT_TTL);
        cache.put("b", json!(2), DEFAULT_TTL);

        // Overwriting refreshes `a`'s insertion position, so `b` is now the
        // oldest insert.
        cache.put("a", json!(10), DEFAULT_TTL);
        cache.put("c", json!(3), DEFAULT_TTL);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(json!(10)));
        assert_eq!(cache.get("c"), Some(json!(3)));
    }
}
