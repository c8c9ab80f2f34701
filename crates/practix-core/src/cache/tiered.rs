//! Two-tier read-through cache with single-flight
//!
//! Read path: local tier, then shared tier (populating local on a hit), then
//! the caller's compute function (writing both tiers). Concurrent misses on
//! one key share a single computation through a per-key `OnceCell`.

use super::local::LocalTier;
use super::shared::SharedTierClient;
use crate::error::CoreError;
use dashmap::{DashMap, DashSet};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Observable lifecycle of one key
///
/// `Empty → Computing → Cached → (Expired | Invalidated) → Empty`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Empty,
    Computing,
    Cached,
    Expired,
    Invalidated,
}

/// Point-in-time counters for one cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub local_hits: u64,
    pub shared_hits: u64,
    pub misses: u64,
    pub computes: u64,
    pub invalidations: u64,
}

impl CacheStatsSnapshot {
    pub fn merge(self, other: Self) -> Self {
        Self {
            local_hits: self.local_hits + other.local_hits,
            shared_hits: self.shared_hits + other.shared_hits,
            misses: self.misses + other.misses,
            computes: self.computes + other.computes,
            invalidations: self.invalidations + other.invalidations,
        }
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.local_hits + self.shared_hits;
        let total = hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }
}

#[derive(Default)]
struct CacheStats {
    local_hits: AtomicU64,
    shared_hits: AtomicU64,
    misses: AtomicU64,
    computes: AtomicU64,
    invalidations: AtomicU64,
}

/// One in-flight computation
struct Flight<V> {
    cell: OnceCell<Result<Arc<V>, CoreError>>,
    /// Cleared by an invalidation that matches the key while computing
    write_back: AtomicBool,
}

impl<V> Flight<V> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            write_back: AtomicBool::new(true),
        }
    }
}

/// Read-through cache for one value family
pub struct TieredCache<V> {
    name: &'static str,
    local: LocalTier<V>,
    shared: Arc<SharedTierClient>,
    inflight: DashMap<String, Arc<Flight<V>>>,
    invalidated: DashSet<String>,
    capacity: u64,
    stats: CacheStats,
}

impl<V> TieredCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(name: &'static str, capacity: u64, shared: Arc<SharedTierClient>) -> Self {
        Self {
            name,
            local: LocalTier::new(capacity),
            shared,
            inflight: DashMap::new(),
            invalidated: DashSet::new(),
            capacity,
            stats: CacheStats::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cached value for `key`, or the result of `compute`
    ///
    /// Every caller attached to the same in-flight computation receives the
    /// same value or the same error. Errors are never cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<V>, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, CoreError>>,
    {
        if let Some(value) = self.local.get(key).await {
            self.stats.local_hits.fetch_add(1, Ordering::Relaxed);
            debug!(cache = self.name, key, "Local hit");
            return Ok(value);
        }

        let flight = Arc::clone(
            self.inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Flight::new()))
                .value(),
        );

        let result = flight
            .cell
            .get_or_init(|| self.fill(key, ttl, &flight, compute))
            .await
            .clone();

        self.inflight.remove_if(key, |_, current| Arc::ptr_eq(current, &flight));
        result
    }

    async fn fill<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        flight: &Flight<V>,
        compute: F,
    ) -> Result<Arc<V>, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, CoreError>>,
    {
        self.invalidated.remove(key);

        // A flight that just finished may have filled the local tier
        if let Some(value) = self.local.get(key).await {
            self.stats.local_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        if let Some(shared) = self.shared.get(key).await {
            match bincode::deserialize::<V>(&shared.bytes) {
                Ok(value) => {
                    self.stats.shared_hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = self.name, key, "Shared hit");
                    let value = Arc::new(value);
                    self.local
                        .insert(key, Arc::clone(&value), shared.remaining.min(ttl))
                        .await;
                    return Ok(value);
                }
                Err(e) => {
                    warn!(cache = self.name, key, error = %e, "Undecodable shared entry, recomputing");
                }
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        self.stats.computes.fetch_add(1, Ordering::Relaxed);
        debug!(cache = self.name, key, "Miss, computing");

        let value = Arc::new(compute().await?);

        if !flight.write_back.load(Ordering::SeqCst) {
            debug!(cache = self.name, key, "Invalidated while computing, not storing");
            return Ok(value);
        }

        self.local.insert(key, Arc::clone(&value), ttl).await;
        match bincode::serialize(value.as_ref()) {
            Ok(bytes) => self.shared.set(key, bytes, ttl).await,
            Err(e) => warn!(cache = self.name, key, error = %e, "Failed to encode value for shared tier"),
        }

        // An invalidation may have landed during the writes above
        if !flight.write_back.load(Ordering::SeqCst) {
            self.local.invalidate(key).await;
            self.shared.delete_prefix(key).await;
        }

        Ok(value)
    }

    /// Purge every key starting with `prefix` from both tiers
    ///
    /// Computations in flight for a matching key still answer the waiters
    /// already attached to them, but do not store their result and are
    /// detached: the next request for that key starts a fresh computation.
    pub async fn invalidate(&self, prefix: &str) {
        self.inflight.retain(|key, flight| {
            if key.starts_with(prefix) {
                flight.write_back.store(false, Ordering::SeqCst);
                false
            } else {
                true
            }
        });

        let removed = self.local.invalidate_prefix(prefix).await;
        if self.invalidated.len() as u64 > self.capacity {
            self.invalidated.clear();
        }
        for key in &removed {
            self.invalidated.insert(key.clone());
        }

        let shared_removed = self.shared.delete_prefix(prefix).await;
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!(
            cache = self.name,
            prefix,
            local_removed = removed.len(),
            shared_removed = ?shared_removed,
            "Invalidated"
        );
    }

    pub async fn state(&self, key: &str) -> KeyState {
        if self.inflight.contains_key(key) {
            return KeyState::Computing;
        }
        match self.local.peek(key).await {
            Some(entry) if entry.is_fresh() => KeyState::Cached,
            Some(_) => KeyState::Expired,
            None if self.invalidated.contains(key) => KeyState::Invalidated,
            None => KeyState::Empty,
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            local_hits: self.stats.local_hits.load(Ordering::Relaxed),
            shared_hits: self.stats.shared_hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            computes: self.stats.computes.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
        }
    }

    pub async fn local_entries(&self) -> u64 {
        self.local.entry_count().await
    }

    /// Drop the local tier only (the shared tier belongs to every process)
    pub async fn clear_local(&self) {
        self.local.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::shared::MemorySharedTier;
    use crate::config::CacheConfig;
    use std::sync::atomic::AtomicUsize;

    fn cache_with(tier: Arc<MemorySharedTier>) -> TieredCache<Vec<u32>> {
        let client = Arc::new(SharedTierClient::new(tier, &CacheConfig::default()));
        TieredCache::new("test", 100, client)
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_second_read_is_local_hit() {
        let cache = cache_with(Arc::new(MemorySharedTier::new()));
        let computes = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("k", TTL, || async {
                    computes.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(*value, vec![1, 2, 3]);
        }

        assert_eq!(computes.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.local_hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(cache.state("k").await, KeyState::Cached);
    }

    #[tokio::test]
    async fn test_shared_hit_populates_local() {
        let tier = Arc::new(MemorySharedTier::new());
        let first = cache_with(tier.clone());
        let second = cache_with(tier);

        first
            .get_or_compute("k", TTL, || async { Ok(vec![9]) })
            .await
            .unwrap();
        let value = second
            .get_or_compute("k", TTL, || async { panic!("should not compute") })
            .await
            .unwrap();

        assert_eq!(*value, vec![9]);
        assert_eq!(second.stats().shared_hits, 1);
        assert_eq!(second.state("k").await, KeyState::Cached);
    }

    #[tokio::test]
    async fn test_concurrent_misses_compute_once() {
        let cache = Arc::new(cache_with(Arc::new(MemorySharedTier::new())));
        let computes = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let computes = Arc::clone(&computes);
                tokio::spawn(async move {
                    cache
                        .get_or_compute("hot", TTL, || async move {
                            computes.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(vec![42])
                        })
                        .await
                })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;
        let first = results[0].as_ref().unwrap().as_ref().unwrap().clone();
        for result in &results {
            let value = result.as_ref().unwrap().as_ref().unwrap();
            assert!(Arc::ptr_eq(value, &first));
        }
        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_waiters_share_error_and_error_is_not_cached() {
        let cache = Arc::new(cache_with(Arc::new(MemorySharedTier::new())));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    cache
                        .get_or_compute("k", TTL, || async {
                            tokio::time::sleep(Duration::from_millis(30)).await;
                            Err(CoreError::ServiceUnavailable {
                                operation: "list".into(),
                            })
                        })
                        .await
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            assert!(matches!(
                result.unwrap(),
                Err(CoreError::ServiceUnavailable { .. })
            ));
        }
        assert_eq!(cache.stats().computes, 1);
        assert_eq!(cache.state("k").await, KeyState::Empty);

        let value = cache
            .get_or_compute("k", TTL, || async { Ok(vec![1]) })
            .await
            .unwrap();
        assert_eq!(*value, vec![1]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let tier = Arc::new(MemorySharedTier::new());
        let cache = cache_with(tier.clone());

        cache
            .get_or_compute("v1:list:a:p1", TTL, || async { Ok(vec![1]) })
            .await
            .unwrap();
        cache.invalidate("v1:list:a:").await;

        assert_eq!(cache.state("v1:list:a:p1").await, KeyState::Invalidated);
        assert!(tier.is_empty());

        let value = cache
            .get_or_compute("v1:list:a:p1", TTL, || async { Ok(vec![2]) })
            .await
            .unwrap();
        assert_eq!(*value, vec![2]);
        assert_eq!(cache.stats().computes, 2);
    }

    #[tokio::test]
    async fn test_invalidation_during_compute_skips_write_back() {
        let cache = Arc::new(cache_with(Arc::new(MemorySharedTier::new())));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let task = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute("v1:category:a:summary", TTL, || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok(vec![1])
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        assert_eq!(cache.state("v1:category:a:summary").await, KeyState::Computing);
        cache.invalidate("v1:category:a:").await;
        release_tx.send(()).unwrap();

        // The waiter still gets its value
        assert_eq!(*task.await.unwrap().unwrap(), vec![1]);
        assert_eq!(cache.state("v1:category:a:summary").await, KeyState::Empty);
    }

    #[tokio::test]
    async fn test_request_after_invalidation_does_not_join_stale_compute() {
        let cache = Arc::new(cache_with(Arc::new(MemorySharedTier::new())));
        let key = "v1:category:a:summary";
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let stale = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute(key, TTL, || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok(vec![1])
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        cache.invalidate("v1:category:a:").await;
        assert_ne!(cache.state(key).await, KeyState::Computing);

        // Completes while the old computation is still held open
        let fresh = cache
            .get_or_compute(key, TTL, || async { Ok(vec![2]) })
            .await
            .unwrap();
        assert_eq!(*fresh, vec![2]);
        assert_eq!(cache.stats().computes, 2);

        release_tx.send(()).unwrap();
        assert_eq!(*stale.await.unwrap().unwrap(), vec![1]);

        // The detached computation neither stored its value nor removed the new one
        let cached = cache
            .get_or_compute(key, TTL, || async { panic!("should be cached") })
            .await
            .unwrap();
        assert_eq!(*cached, vec![2]);
    }

    #[tokio::test]
    async fn test_invalidation_during_outage_is_applied_on_recovery() {
        let tier = Arc::new(MemorySharedTier::new());
        let cache = cache_with(tier.clone());
        let key = "v1:list:a:p1";

        cache
            .get_or_compute(key, TTL, || async { Ok(vec![1]) })
            .await
            .unwrap();
        assert_eq!(tier.len(), 1);

        tier.set_available(false);
        cache.invalidate("v1:list:a:").await;
        tier.set_available(true);

        let value = cache
            .get_or_compute(key, TTL, || async { Ok(vec![2]) })
            .await
            .unwrap();
        assert_eq!(*value, vec![2]);
        assert_eq!(cache.stats().computes, 2);
        assert_eq!(cache.stats().shared_hits, 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_recomputed() {
        let cache = cache_with(Arc::new(MemorySharedTier::new()));
        let short = Duration::from_millis(30);

        cache
            .get_or_compute("k", short, || async { Ok(vec![1]) })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let value = cache
            .get_or_compute("k", short, || async { Ok(vec![2]) })
            .await
            .unwrap();
        assert_eq!(*value, vec![2]);
    }

    #[tokio::test]
    async fn test_shared_outage_degrades_to_local() {
        let tier = Arc::new(MemorySharedTier::new());
        tier.set_available(false);
        let cache = cache_with(tier);

        for _ in 0..2 {
            let value = cache
                .get_or_compute("k", TTL, || async { Ok(vec![5]) })
                .await
                .unwrap();
            assert_eq!(*value, vec![5]);
        }
        assert_eq!(cache.stats().computes, 1);
    }
}
