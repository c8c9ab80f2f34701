//! Backing store access
//!
//! [`BackingStore`] is the raw scan/filter primitive over the item corpus.
//! [`StoreAccessor`] wraps it with timeouts, a single retry, ordering and
//! call accounting; everything above it (aggregation, query service) only
//! talks to the accessor.

pub mod accessor;
pub mod corpus;
pub mod sort;
pub mod synthetic;

pub use accessor::StoreAccessor;
pub use corpus::{CorpusLoader, CorpusSnapshot, CorpusStore};
pub use synthetic::SyntheticCorpus;

use crate::error::CoreError;
use practix_types::{CategoryDef, CategoryId, Difficulty, Item};
use std::sync::Arc;

/// Which part of the corpus a scan covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanScope {
    Category(CategoryId),
    All,
}

/// Normalized free-text search terms
///
/// Lowercased, whitespace-split tokens; an item matches when every token is a
/// substring of its title or of one of its tags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchTerms {
    tokens: Vec<String>,
}

impl SearchTerms {
    pub fn parse(query: &str) -> Self {
        Self {
            tokens: query
                .split_whitespace()
                .map(|t| t.to_lowercase())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens joined by single spaces
    pub fn normalized(&self) -> String {
        self.tokens.join(" ")
    }

    pub fn matches(&self, item: &Item) -> bool {
        let title = item.title.to_lowercase();
        self.tokens.iter().all(|token| {
            title.contains(token.as_str())
                || item
                    .tag_set
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(token.as_str()))
        })
    }
}

/// Closed predicate evaluated by the store during a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPredicate {
    pub difficulty: Option<Difficulty>,
    pub terms: Option<SearchTerms>,
}

impl ItemPredicate {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_difficulty(mut self, difficulty: Option<Difficulty>) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_terms(mut self, terms: SearchTerms) -> Self {
        self.terms = Some(terms);
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(difficulty) = self.difficulty {
            if item.difficulty != difficulty {
                return false;
            }
        }
        match &self.terms {
            Some(terms) => terms.matches(item),
            None => true,
        }
    }
}

/// Raw access to the item corpus
///
/// Implementations are synchronous; [`StoreAccessor`] runs them on the
/// blocking pool under a timeout.
pub trait BackingStore: Send + Sync + 'static {
    /// Categories in declaration order
    fn category_defs(&self) -> Vec<CategoryDef>;

    /// Items in `scope` matching `predicate`, in storage order
    ///
    /// Fails with [`CoreError::CategoryNotFound`] for an unknown category.
    fn scan(&self, scope: &ScanScope, predicate: &ItemPredicate)
        -> Result<Vec<Arc<Item>>, CoreError>;

    /// Total number of items in the corpus
    fn item_count(&self) -> usize;
}
