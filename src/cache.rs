//! Optional response cache keyed by the upstream URL actually fetched.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rama::http::{Body, HeaderMap, Response, StatusCode};

use crate::config::CacheConfig;

/// Max-age stamped on every relayed response (30 days).
pub const MAX_CACHE_AGE_SECS: u64 = 86_400 * 30;

/// Fully buffered response. Each hit builds a new `Response` from it.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub stored_at: Instant,
}

impl CachedEntry {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Instant::now(),
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stored_at.elapsed() >= Duration::from_secs(MAX_CACHE_AGE_SECS)
    }

    pub fn to_response(&self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

/// Key-value cache capability. Consistency under concurrent writers is up to
/// the implementation; the forwarder does not coordinate writes.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<CachedEntry>;
    async fn put(&self, key: &str, entry: CachedEntry);
    /// Whether a body of `len` bytes is worth buffering for `put`.
    fn admits(&self, len: u64) -> bool;
}

/// Bounded in-process store.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CachedEntry>>,
    max_entries: usize,
    max_entry_bytes: usize,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: config.max_entries,
            max_entry_bytes: config.max_entry_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<CachedEntry> {
        let mut entries = self.entries.lock();
        if entries.get(key)?.is_stale() {
            entries.remove(key);
            return None;
        }
        entries.get(key).cloned()
    }

    fn admits(&self, len: u64) -> bool {
        usize::try_from(len).is_ok_and(|len| len <= self.max_entry_bytes)
    }

    async fn put(&self, key: &str, entry: CachedEntry) {
        if entry.body.len() > self.max_entry_bytes {
            tracing::debug!(key, size = entry.body.len(), "response too large to cache");
            return;
        }

        let mut entries = self.entries.lock();
        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            entries.retain(|_, existing| !existing.is_stale());
            if entries.len() >= self.max_entries {
                // Drop the oldest entry to make room.
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, existing)| existing.stored_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(key.to_string(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rama::http::{HeaderValue, header};

    fn config(max_entries: usize, max_entry_bytes: usize) -> CacheConfig {
        CacheConfig {
            enabled: true,
            max_entries,
            max_entry_bytes,
        }
    }

    fn entry(body: &'static str) -> CachedEntry {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        CachedEntry::new(StatusCode::OK, headers, Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test]
    async fn stores_and_returns_entries() {
        let cache = MemoryCache::new(&config(4, 1024));
        cache.put("https://registry/a", entry("a")).await;

        let hit = cache.get("https://registry/a").await.unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"a"));
        assert!(cache.get("https://registry/b").await.is_none());
    }

    #[test]
    fn admits_up_to_the_entry_limit() {
        let cache = MemoryCache::new(&config(4, 8));
        assert!(cache.admits(0));
        assert!(cache.admits(8));
        assert!(!cache.admits(9));
        assert!(!cache.admits(u64::MAX));
    }

    #[tokio::test]
    async fn skips_oversized_bodies() {
        let cache = MemoryCache::new(&config(4, 2));
        cache.put("k", entry("too long")).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn evicts_oldest_when_full() {
        let cache = MemoryCache::new(&config(2, 1024));
        let mut first = entry("1");
        if let Some(earlier) = Instant::now().checked_sub(Duration::from_secs(5)) {
            first.stored_at = earlier;
        }
        cache.put("first", first).await;
        cache.put("second", entry("2")).await;
        cache.put("third", entry("3")).await;

        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").await.is_none());
        assert!(cache.get("third").await.is_some());
    }

    #[tokio::test]
    async fn replacing_a_key_does_not_evict() {
        let cache = MemoryCache::new(&config(2, 1024));
        cache.put("a", entry("1")).await;
        cache.put("b", entry("2")).await;
        cache.put("a", entry("3")).await;

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").await.unwrap().body, Bytes::from_static(b"3"));
    }

    #[test]
    fn stale_after_max_age() {
        let mut old = entry("x");
        match Instant::now().checked_sub(Duration::from_secs(MAX_CACHE_AGE_SECS + 1)) {
            Some(past) => old.stored_at = past,
            // Monotonic clock too young to represent the past instant.
            None => return,
        }
        assert!(old.is_stale());
        assert!(!entry("y").is_stale());
    }

    #[tokio::test]
    async fn each_hit_builds_a_fresh_response() {
        let cached = entry("body");
        let first = cached.to_response();
        let second = cached.to_response();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain");

        use rama::http::body::util::BodyExt;
        let a = first.into_body().collect().await.unwrap().to_bytes();
        let b = second.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(a, b);
    }
}
