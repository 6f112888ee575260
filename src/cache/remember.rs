//! Typed cache-aside access on top of a [`CacheBackend`].
//!
//! Values are stored as JSON. A backend failure or an undecodable payload is
//! treated as a miss, so the cache can only ever make a call slower, never
//! fail it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use super::keys::CacheKey;
use super::store::{CacheBackend, CacheError};

const SOURCE: &str = "cache::remember";

pub(crate) const METRIC_CACHE_HIT: &str = "guesssenpai_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "guesssenpai_cache_miss_total";
pub(crate) const METRIC_CACHE_COALESCED: &str = "guesssenpai_cache_coalesced_total";

/// Per-key producer locks for coalescing concurrent misses.
#[derive(Default)]
pub struct InFlightKeys {
    keys: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl InFlightKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other producer holds `key`, then hold it.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let lock = Arc::clone(self.keys.entry(key.to_string()).or_default().value());
        let permit = Arc::clone(&lock).lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            keys: Arc::clone(&self.keys),
            lock,
            permit: Some(permit),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub struct KeyGuard {
    key: String,
    keys: Arc<DashMap<String, Arc<Mutex<()>>>>,
    lock: Arc<Mutex<()>>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.permit.take();
        // The map and this guard hold one reference each; any more are waiters.
        let lock = &self.lock;
        self.keys
            .remove_if(&self.key, |_, entry| {
                Arc::ptr_eq(entry, lock) && Arc::strong_count(entry) <= 2
            });
    }
}

/// JSON cache-aside helper shared by every cached call in the crate.
#[derive(Clone)]
pub struct CacheAside {
    backend: Arc<dyn CacheBackend>,
    in_flight: Option<Arc<InFlightKeys>>,
}

impl CacheAside {
    pub fn new(backend: Arc<dyn CacheBackend>, single_flight: bool) -> Self {
        Self {
            backend,
            in_flight: single_flight.then(|| Arc::new(InFlightKeys::new())),
        }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Cached value for `key`, or `None` on miss, backend error or stale shape.
    pub async fn get_json<T>(&self, key: &CacheKey) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let rendered = key.to_string();
        let bytes = match self.backend.get(&rendered).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    op = "get",
                    key = %rendered,
                    result = "backend_error",
                    error = %err,
                    "Cache read failed; treating as miss"
                );
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    op = "get",
                    key = %rendered,
                    result = "decode_error",
                    error = %err,
                    "Cached payload could not be decoded; treating as miss"
                );
                None
            }
        }
    }

    pub async fn set_json<T>(&self, key: &CacheKey, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let encoded = serde_json::to_vec(value).map_err(|err| CacheError::Encode(err.to_string()))?;
        self.backend
            .set(&key.to_string(), Bytes::from(encoded), ttl)
            .await
    }

    /// Return the cached value for `key`, or run `producer`, store its value
    /// and return it.
    ///
    /// Producer errors are returned unchanged and nothing is stored. With
    /// single-flight enabled, concurrent misses on one key wait for the first
    /// producer and then read its result.
    pub async fn remember<T, E, F, Fut>(&self, key: &CacheKey, ttl: Duration, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let namespace = key.namespace();
        if let Some(value) = self.get_json(key).await {
            counter!(METRIC_CACHE_HIT, "namespace" => namespace).increment(1);
            debug!(target = SOURCE, op = "remember", key = %key, result = "hit");
            return Ok(value);
        }

        let _guard = match &self.in_flight {
            Some(in_flight) => {
                let guard = in_flight.acquire(&key.to_string()).await;
                if let Some(value) = self.get_json(key).await {
                    counter!(METRIC_CACHE_COALESCED, "namespace" => namespace).increment(1);
                    debug!(target = SOURCE, op = "remember", key = %key, result = "coalesced");
                    return Ok(value);
                }
                Some(guard)
            }
            None => None,
        };

        counter!(METRIC_CACHE_MISS, "namespace" => namespace).increment(1);
        let started_at = Instant::now();
        let value = producer().await?;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        match self.set_json(key, &value, ttl).await {
            Ok(()) => debug!(
                target = SOURCE,
                op = "remember",
                key = %key,
                result = "stored",
                elapsed_ms
            ),
            Err(err) => warn!(
                target = SOURCE,
                op = "remember",
                key = %key,
                result = "store_failed",
                elapsed_ms,
                error = %err,
                "Computed value could not be cached"
            ),
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::macros::date;

    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::store::InMemoryCache;
    use crate::domain::types::MediaId;

    fn cache(single_flight: bool) -> CacheAside {
        CacheAside::new(
            Arc::new(InMemoryCache::new(&CacheConfig::default())),
            single_flight,
        )
    }

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
            Err(CacheError::unavailable("offline"))
        }

        async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::unavailable("offline"))
        }
    }

    #[tokio::test]
    async fn remember_runs_producer_once_per_key() {
        let cache = cache(false);
        let key = CacheKey::MediaDetails(MediaId(1));
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let calls = &calls;
            let value: Result<u32, Infallible> = cache
                .remember(&key, Duration::from_secs(60), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value, Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn producer_errors_are_not_cached() {
        let cache = cache(true);
        let key = CacheKey::PopularPool(date!(2024 - 01 - 05));
        let failed: Result<u32, &str> = cache
            .remember(&key, Duration::from_secs(60), || async { Err("upstream down") })
            .await;
        assert_eq!(failed, Err("upstream down"));

        let recovered: Result<u32, &str> = cache
            .remember(&key, Duration::from_secs(60), || async { Ok(7) })
            .await;
        assert_eq!(recovered, Ok(7));
    }

    #[tokio::test]
    async fn broken_backend_degrades_to_producer() {
        let cache = CacheAside::new(Arc::new(BrokenBackend), true);
        let key = CacheKey::UserLists(9);
        let value: Result<String, Infallible> = cache
            .remember(&key, Duration::from_secs(60), || async { Ok("fresh".to_string()) })
            .await;
        assert_eq!(value.as_deref(), Ok("fresh"));
    }

    #[tokio::test]
    async fn stale_payload_shape_is_a_miss() {
        let cache = cache(false);
        let key = CacheKey::UserHistory(3);
        cache
            .set_json(&key, &"not a list", Duration::from_secs(60))
            .await
            .expect("set");
        let value: Result<Vec<i64>, Infallible> = cache
            .remember(&key, Duration::from_secs(60), || async { Ok(vec![1, 2]) })
            .await;
        assert_eq!(value, Ok(vec![1, 2]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_flight_coalesces_concurrent_misses() {
        let cache = cache(true);
        let key = CacheKey::MediaDetails(MediaId(5));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let key = key.clone();
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .remember(&key, Duration::from_secs(60), || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, Infallible>(5u32)
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.expect("task"), Ok(5));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let in_flight = cache.in_flight.as_ref().expect("single flight enabled");
        assert!(in_flight.is_empty());
    }
}
