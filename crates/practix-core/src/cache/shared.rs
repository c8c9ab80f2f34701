//! Shared cache tier
//!
//! [`SharedTier`] is the raw byte store shared by every server process.
//! [`SharedTierClient`] is what the tiered cache actually talks to: it runs
//! each call on the blocking pool under a short timeout, turns every failure
//! into a logged miss, and stops calling a tier that keeps failing for a
//! cooldown period.
//!
//! A prefix delete that cannot reach the tier leaves a tombstone behind.
//! Shared entries under a tombstone read as misses, and the delete is
//! retried before every read until it succeeds or every entry it covers has
//! expired on its own.

use crate::config::CacheConfig;
use crate::error::CoreError;
use crate::event::{DataEvent, EventBus};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A value read from the shared tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedValue {
    pub bytes: Vec<u8>,
    /// Time left before the entry expires
    pub remaining: Duration,
}

/// Byte-level key/value store with per-entry TTL and prefix deletion
pub trait SharedTier: Send + Sync + 'static {
    /// Backend name for logs and health output
    fn name(&self) -> &'static str;

    /// Fresh value for `key`, if any
    fn get(&self, key: &str) -> Result<Option<SharedValue>, CoreError>;

    fn set(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CoreError>;

    /// Delete every entry whose key starts with `prefix`, returning the count
    fn delete_prefix(&self, prefix: &str) -> Result<usize, CoreError>;
}

/// In-process shared tier
///
/// Used when no shared path is configured. `set_available(false)` makes
/// every call fail, which is how outages are simulated.
#[derive(Default)]
pub struct MemorySharedTier {
    entries: DashMap<String, (Vec<u8>, Instant, Duration)>,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemorySharedTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Add an artificial delay to every call
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check(&self) -> Result<(), CoreError> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::SharedCacheUnavailable {
                message: "memory tier disabled".to_string(),
            });
        }
        Ok(())
    }
}

impl SharedTier for MemorySharedTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<SharedValue>, CoreError> {
        self.check()?;
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        let (bytes, created_at, ttl) = entry.value();
        let age = created_at.elapsed();
        if age >= *ttl {
            drop(entry);
            self.entries.remove(key);
            return Ok(None);
        }
        Ok(Some(SharedValue {
            bytes: bytes.clone(),
            remaining: *ttl - age,
        }))
    }

    fn set(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CoreError> {
        self.check()?;
        self.entries
            .insert(key.to_string(), (bytes.to_vec(), Instant::now(), ttl));
        Ok(())
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize, CoreError> {
        self.check()?;
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - self.entries.len())
    }
}

/// Shared tier health as reported to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedTierStatus {
    pub backend: &'static str,
    pub available: bool,
    pub pending_deletes: usize,
    pub consecutive_failures: u32,
    pub total_failures: u64,
}

/// Timeout and breaker wrapper around a [`SharedTier`]
pub struct SharedTierClient {
    tier: Arc<dyn SharedTier>,
    timeout: Duration,
    breaker_threshold: u32,
    breaker_cooldown: Duration,
    consecutive_failures: AtomicU32,
    total_failures: AtomicU64,
    open_until: Mutex<Option<Instant>>,
    /// Prefix deletes still owed to the tier, by when they were first missed
    tombstones: DashMap<String, Instant>,
    tombstone_ttl: Duration,
    events: Option<EventBus>,
}

impl SharedTierClient {
    pub fn new(tier: Arc<dyn SharedTier>, config: &CacheConfig) -> Self {
        Self {
            tier,
            timeout: config.shared_timeout(),
            breaker_threshold: config.breaker_threshold.max(1),
            breaker_cooldown: config.breaker_cooldown(),
            consecutive_failures: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
            open_until: Mutex::new(None),
            tombstones: DashMap::new(),
            tombstone_ttl: config.longest_ttl(),
            events: None,
        }
    }

    /// Publish [`DataEvent::SharedTierDegraded`] when the breaker opens
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn get(&self, key: &str) -> Option<SharedValue> {
        self.flush_tombstones().await;
        if self.is_tombstoned(key) {
            debug!(key, "Shared entry awaiting delete, treating as miss");
            return None;
        }

        let owned = key.to_string();
        self.call("get", move |tier| tier.get(&owned))
            .await
            .flatten()
    }

    pub async fn set(&self, key: &str, bytes: Vec<u8>, ttl: Duration) {
        let owned = key.to_string();
        self.call("set", move |tier| tier.set(&owned, &bytes, ttl))
            .await;
    }

    /// Returns `None` when the tier could not be reached; the delete is
    /// then kept as a tombstone and retried later
    pub async fn delete_prefix(&self, prefix: &str) -> Option<usize> {
        let owned = prefix.to_string();
        let deleted = self
            .call("delete_prefix", move |tier| tier.delete_prefix(&owned))
            .await;

        match deleted {
            Some(_) => self
                .tombstones
                .retain(|pending, _| !pending.starts_with(prefix)),
            None => {
                warn!(prefix, "Shared delete failed, keeping tombstone");
                self.tombstones.insert(prefix.to_string(), Instant::now());
            }
        }
        deleted
    }

    /// Prefix deletes not yet applied to the tier
    pub fn pending_deletes(&self) -> usize {
        self.tombstones.len()
    }

    fn is_tombstoned(&self, key: &str) -> bool {
        self.tombstones
            .iter()
            .any(|entry| key.starts_with(entry.key().as_str()))
    }

    async fn flush_tombstones(&self) {
        if self.tombstones.is_empty() {
            return;
        }
        self.tombstones
            .retain(|_, missed_at| missed_at.elapsed() < self.tombstone_ttl);

        let pending: Vec<(String, Instant)> = self
            .tombstones
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        for (prefix, missed_at) in pending {
            let owned = prefix.clone();
            let deleted = self
                .call("delete_prefix", move |tier| tier.delete_prefix(&owned))
                .await;
            let Some(count) = deleted else {
                return;
            };
            // A newer miss on the same prefix keeps its own tombstone
            self.tombstones
                .remove_if(&prefix, |_, current| *current == missed_at);
            info!(prefix = %prefix, deleted = count, "Applied pending shared delete");
        }
    }

    pub fn status(&self) -> SharedTierStatus {
        SharedTierStatus {
            backend: self.tier.name(),
            available: !self.breaker_open(),
            pending_deletes: self.tombstones.len(),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
        }
    }

    fn breaker_open(&self) -> bool {
        let mut open_until = self.open_until.lock();
        match *open_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                // Half-open: let the next call try the tier
                *open_until = None;
                info!(backend = self.tier.name(), "Shared cache breaker closed, retrying");
                false
            }
            None => false,
        }
    }

    async fn call<T, F>(&self, operation: &'static str, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SharedTier) -> Result<T, CoreError> + Send + 'static,
    {
        if self.breaker_open() {
            debug!(operation, "Shared cache bypassed");
            return None;
        }

        let tier = Arc::clone(&self.tier);
        let task = tokio::task::spawn_blocking(move || f(tier.as_ref()));

        let error = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(value))) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                return Some(value);
            }
            Ok(Ok(Err(e))) => e,
            Ok(Err(join_error)) => CoreError::SharedCacheUnavailable {
                message: join_error.to_string(),
            },
            Err(_) => CoreError::SharedCacheUnavailable {
                message: format!("{} timed out after {}ms", operation, self.timeout.as_millis()),
            },
        };

        self.record_failure(operation, &error);
        None
    }

    fn record_failure(&self, operation: &'static str, error: &CoreError) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(operation, failures, error = %error, "Shared cache call failed, treating as miss");

        if failures >= self.breaker_threshold {
            *self.open_until.lock() = Some(Instant::now() + self.breaker_cooldown);
            self.consecutive_failures.store(0, Ordering::Relaxed);
            warn!(
                backend = self.tier.name(),
                cooldown_ms = self.breaker_cooldown.as_millis() as u64,
                "Shared cache breaker opened"
            );
            if let Some(events) = &self.events {
                events.publish(DataEvent::SharedTierDegraded {
                    reason: error.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CacheConfig {
        CacheConfig {
            shared_timeout_ms: 20,
            breaker_threshold: 2,
            breaker_cooldown_ms: 60_000,
            ..CacheConfig::default()
        }
    }

    /// Never opens the breaker, so every call reaches the tier
    fn tolerant_config() -> CacheConfig {
        CacheConfig {
            breaker_threshold: 100,
            ..config()
        }
    }

    #[test]
    fn test_memory_tier_prefix_delete_and_expiry() {
        let tier = MemorySharedTier::new();
        tier.set("v1:list:a:p1", b"1", Duration::from_secs(60)).unwrap();
        tier.set("v1:list:a:p2", b"2", Duration::from_secs(60)).unwrap();
        tier.set("v1:list:b:p1", b"3", Duration::from_secs(60)).unwrap();
        tier.set("v1:gone", b"4", Duration::ZERO).unwrap();

        assert_eq!(tier.delete_prefix("v1:list:a:").unwrap(), 2);
        assert!(tier.get("v1:list:a:p1").unwrap().is_none());
        assert_eq!(tier.get("v1:list:b:p1").unwrap().unwrap().bytes, b"3");
        assert!(tier.get("v1:gone").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_client_treats_failures_as_miss() {
        let tier = Arc::new(MemorySharedTier::new());
        let client = SharedTierClient::new(tier.clone(), &config());

        client.set("k", b"v".to_vec(), Duration::from_secs(60)).await;
        assert_eq!(client.get("k").await.unwrap().bytes, b"v");

        tier.set_available(false);
        assert!(client.get("k").await.is_none());
        assert_eq!(client.status().total_failures, 1);
        assert!(client.status().available);
    }

    #[tokio::test]
    async fn test_failed_delete_masks_entries_until_applied() {
        let tier = Arc::new(MemorySharedTier::new());
        let client = SharedTierClient::new(tier.clone(), &tolerant_config());
        let ttl = Duration::from_secs(60);

        client.set("v1:list:a:p1", b"old".to_vec(), ttl).await;
        client.set("v1:list:b:p1", b"keep".to_vec(), ttl).await;

        tier.set_available(false);
        assert_eq!(client.delete_prefix("v1:list:a:").await, None);
        assert_eq!(client.pending_deletes(), 1);

        // Still unreachable: the tombstone hides the entry
        assert!(client.get("v1:list:a:p1").await.is_none());
        assert_eq!(client.pending_deletes(), 1);

        tier.set_available(true);
        assert!(client.get("v1:list:a:p1").await.is_none());
        assert_eq!(client.pending_deletes(), 0);
        assert_eq!(tier.len(), 1);
        assert_eq!(client.get("v1:list:b:p1").await.unwrap().bytes, b"keep");
    }

    #[tokio::test]
    async fn test_successful_delete_clears_covered_tombstones() {
        let tier = Arc::new(MemorySharedTier::new());
        let client = SharedTierClient::new(tier.clone(), &tolerant_config());

        tier.set_available(false);
        client.delete_prefix("v1:list:a:").await;
        assert_eq!(client.pending_deletes(), 1);

        tier.set_available(true);
        assert_eq!(client.delete_prefix("v1:list:").await, Some(0));
        assert_eq!(client.pending_deletes(), 0);
    }

    #[tokio::test]
    async fn test_breaker_opens_and_publishes() {
        let tier = Arc::new(MemorySharedTier::new());
        let bus = EventBus::default_capacity();
        let mut rx = bus.subscribe();
        let client = SharedTierClient::new(tier.clone(), &config()).with_events(bus);

        tier.set_latency(Some(Duration::from_millis(100)));
        assert!(client.get("k").await.is_none());
        assert!(client.get("k").await.is_none());

        let status = client.status();
        assert!(!status.available);
        assert_eq!(status.total_failures, 2);
        assert!(matches!(rx.recv().await.unwrap(), DataEvent::SharedTierDegraded { .. }));

        // Bypassed: no further failures are recorded while open
        tier.set_latency(None);
        assert!(client.get("k").await.is_none());
        assert_eq!(client.status().total_failures, 2);
    }
}
