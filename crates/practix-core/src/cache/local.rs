//! In-process cache tier
//!
//! A bounded moka cache with LRU eviction and a TTL carried by each entry.
//! Freshness is checked again on read, so an entry is never served once its
//! age reaches its TTL even if moka has not evicted it yet.

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A cached value with its creation time and TTL
#[derive(Debug)]
pub struct LocalEntry<V> {
    pub value: Arc<V>,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl<V> Clone for LocalEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            created_at: self.created_at,
            ttl: self.ttl,
        }
    }
}

impl<V> LocalEntry<V> {
    pub fn is_fresh(&self) -> bool {
        self.created_at.elapsed() < self.ttl
    }
}

struct EntryExpiry;

impl<V> Expiry<String, LocalEntry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &LocalEntry<V>,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &LocalEntry<V>,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Capacity-bounded LRU tier for one value family
pub struct LocalTier<V> {
    cache: Cache<String, LocalEntry<V>>,
}

impl<V: Send + Sync + 'static> LocalTier<V> {
    pub fn new(capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryExpiry)
            .build();
        Self { cache }
    }

    /// Fresh value for `key`; stale entries are dropped on the way
    pub async fn get(&self, key: &str) -> Option<Arc<V>> {
        let entry = self.cache.get(key).await?;
        if entry.is_fresh() {
            Some(entry.value)
        } else {
            self.cache.invalidate(key).await;
            None
        }
    }

    /// Raw entry, fresh or not
    pub async fn peek(&self, key: &str) -> Option<LocalEntry<V>> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: &str, value: Arc<V>, ttl: Duration) {
        let entry = LocalEntry {
            value,
            created_at: Instant::now(),
            ttl,
        };
        self.cache.insert(key.to_string(), entry).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Remove every entry whose key starts with `prefix`, returning the keys
    pub async fn invalidate_prefix(&self, prefix: &str) -> Vec<String> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in &keys {
            self.cache.invalidate(key).await;
        }
        keys
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Approximate entry count (pending maintenance is flushed first)
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}
