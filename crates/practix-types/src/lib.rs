//! practix-types - Shared data types for practix
//!
//! This crate contains pure data structures without heavy dependencies.
//! No tokio, no async runtime - just serde-serializable types.
//!
//! Used by:
//! - practix-core (aggregation, cache, query service)
//! - practix-web (JSON API)
//! - practix-tui (client state and rendering)

pub mod models;
pub mod query;

pub use models::{
    Category, CategoryDef, CategoryId, CategoryMastery, Difficulty, DifficultyHistogram, Item,
    ItemId, Page, ProgressMarker, UserId,
};
pub use query::{
    ListFilters, ParamError, SearchFilters, SortField, SortOrder, SortSpec, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE, view_signature,
};
