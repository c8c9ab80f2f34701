//! Catalog data models

pub mod category;
pub mod item;
pub mod page;
pub mod progress;

pub use category::{Category, CategoryDef, CategoryMastery, DifficultyHistogram};
pub use item::{CategoryId, Difficulty, Item, ItemId};
pub use page::Page;
pub use progress::{ProgressMarker, UserId};
