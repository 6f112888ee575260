//! Cache storage backends.
//!
//! The assembler only sees [`CacheBackend`]; the process owns the concrete
//! backend and hands it in at construction.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache payload could not be encoded: {0}")]
    Encode(String),
}

impl CacheError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Key/value store with per-entry expiry.
///
/// Implementations must make `get` and `set` atomic per key; nothing else is
/// assumed about cross-key consistency.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;
}

struct Entry {
    value: Bytes,
    expires_at: Instant,
}

/// Process-local backend with LRU eviction and lazy expiry.
pub struct InMemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl InMemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = mutex_lock(&self.entries, SOURCE, "set");
        if let Some((evicted, _)) = entries.push(key.to_string(), entry)
            && evicted != key
        {
            counter!("guesssenpai_cache_evict_total").increment(1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> InMemoryCache {
        InMemoryCache::new(&CacheConfig {
            capacity,
            ..CacheConfig::default()
        })
    }

    #[tokio::test]
    async fn stores_and_returns_values() {
        let cache = cache(4);
        cache
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(60))
            .await
            .expect("set");
        assert_eq!(
            cache.get("k").await.expect("get"),
            Some(Bytes::from_static(b"v"))
        );
        assert_eq!(cache.get("missing").await.expect("get"), None);
    }

    #[tokio::test]
    async fn expired_entries_are_dropped() {
        let cache = cache(4);
        cache
            .set("k", Bytes::from_static(b"v"), Duration::ZERO)
            .await
            .expect("set");
        assert_eq!(cache.get("k").await.expect("get"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let cache = cache(2);
        let ttl = Duration::from_secs(60);
        cache.set("a", Bytes::from_static(b"1"), ttl).await.expect("set");
        cache.set("b", Bytes::from_static(b"2"), ttl).await.expect("set");
        cache.get("a").await.expect("get");
        cache.set("c", Bytes::from_static(b"3"), ttl).await.expect("set");

        assert!(cache.get("a").await.expect("get").is_some());
        assert!(cache.get("b").await.expect("get").is_none());
        assert_eq!(cache.len(), 2);
    }
}
