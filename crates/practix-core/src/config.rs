//! Runtime configuration
//!
//! Loaded from an optional TOML file; every field has a default so a
//! partial file (or none at all) is valid.
//!
//! ```toml
//! [query]
//! default_page_size = 20
//!
//! [cache]
//! search_ttl_secs = 30
//! shared_path = "/var/cache/practix/shared.db"
//! ```

use crate::error::CoreError;
use anyhow::{Context, Result};
use practix_types::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum number of top-level categories a corpus may declare
pub const MAX_CATEGORIES: usize = 15;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PractixConfig {
    pub query: QueryConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Shorter search queries return an empty page without any lookup
    pub min_search_chars: usize,
    /// Top-N items kept in each category summary
    pub sample_size: usize,
    /// Weight of quality vs relevance in the sample ranking
    pub sample_quality_weight: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            min_search_chars: 2,
            sample_size: 5,
            sample_quality_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub category_ttl_secs: u64,
    pub page_ttl_secs: u64,
    pub search_ttl_secs: u64,
    pub mastery_ttl_secs: u64,
    /// Local tier capacity, per value family
    pub local_capacity: u64,
    /// SQLite file shared by every process on the host; in-process tier if unset
    pub shared_path: Option<PathBuf>,
    pub shared_timeout_ms: u64,
    /// Consecutive shared-tier failures before it is bypassed
    pub breaker_threshold: u32,
    pub breaker_cooldown_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            category_ttl_secs: 300,
            page_ttl_secs: 120,
            search_ttl_secs: 30,
            mastery_ttl_secs: 60,
            local_capacity: 10_000,
            shared_path: None,
            shared_timeout_ms: 50,
            breaker_threshold: 5,
            breaker_cooldown_ms: 3_000,
        }
    }
}

impl CacheConfig {
    pub fn category_ttl(&self) -> Duration {
        Duration::from_secs(self.category_ttl_secs)
    }

    pub fn page_ttl(&self) -> Duration {
        Duration::from_secs(self.page_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn mastery_ttl(&self) -> Duration {
        Duration::from_secs(self.mastery_ttl_secs)
    }

    /// No entry in any family outlives this
    pub fn longest_ttl(&self) -> Duration {
        [
            self.category_ttl(),
            self.page_ttl(),
            self.search_ttl(),
            self.mastery_ttl(),
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
    }

    pub fn shared_timeout(&self) -> Duration {
        Duration::from_millis(self.shared_timeout_ms)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_millis(self.breaker_cooldown_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub timeout_ms: u64,
    pub retry_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            retry_backoff_ms: 100,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Settings consumed by the interactive client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Expanded categories older than this are refetched
    pub freshness_secs: u64,
    pub search_debounce_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub overscan_rows: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            freshness_secs: 60,
            search_debounce_ms: 300,
            retry_attempts: 3,
            retry_base_ms: 200,
            retry_max_ms: 2_000,
            overscan_rows: 3,
        }
    }
}

impl PractixConfig {
    /// Load from a TOML file, or defaults when `path` is `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: PractixConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent values
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |message: &str| {
            Err(CoreError::InvalidConfig {
                message: message.to_string(),
            })
        };

        if self.query.max_page_size == 0 || self.query.max_page_size > MAX_PAGE_SIZE {
            return invalid("query.max_page_size must be within 1..=100");
        }
        if self.query.default_page_size == 0
            || self.query.default_page_size > self.query.max_page_size
        {
            return invalid("query.default_page_size must be within 1..=max_page_size");
        }
        if self.query.sample_size == 0 {
            return invalid("query.sample_size must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.query.sample_quality_weight) {
            return invalid("query.sample_quality_weight must be within 0.0..=1.0");
        }
        if self.cache.search_ttl_secs > self.cache.page_ttl_secs {
            return invalid("cache.search_ttl_secs must not exceed cache.page_ttl_secs");
        }
        if self.cache.local_capacity == 0 {
            return invalid("cache.local_capacity must be at least 1");
        }
        if self.store.timeout_ms == 0 {
            return invalid("store.timeout_ms must be at least 1");
        }
        Ok(())
    }
}
