//! Caching layer for practix-core
//!
//! A per-process LRU tier in front of a host-wide shared tier, with
//! single-flight computation and prefix invalidation.

pub mod keys;
pub mod local;
pub mod shared;
pub mod sqlite;
pub mod tiered;

pub use local::LocalTier;
pub use shared::{MemorySharedTier, SharedTier, SharedTierClient, SharedTierStatus, SharedValue};
pub use sqlite::SqliteSharedTier;
pub use tiered::{CacheStatsSnapshot, KeyState, TieredCache};
