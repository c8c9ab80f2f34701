//! practix-core - Core library for practix
//!
//! Provides the backing store accessor, category aggregation, the tiered
//! cache and the query service over a practice-item catalog.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod invalidation;
pub mod progress;
pub mod query;
pub mod store;
pub mod watcher;

pub use aggregate::AggregationEngine;
pub use cache::{KeyState, MemorySharedTier, SharedTier, SqliteSharedTier, TieredCache};
pub use config::PractixConfig;
pub use error::{CoreError, DegradedState, LoadReport};
pub use event::{DataEvent, EventBus};
pub use progress::{InMemoryProgress, ProgressSource};
pub use query::{HealthReport, QueryService};
pub use store::{BackingStore, CorpusStore, StoreAccessor, SyntheticCorpus};
pub use watcher::FileWatcher;
