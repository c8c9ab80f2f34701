//! Category summaries
//!
//! One scan per category; histogram, count and a bounded top-N sample are
//! all maintained in the same pass.

use crate::config::QueryConfig;
use crate::error::CoreError;
use crate::store::StoreAccessor;
use practix_types::{Category, CategoryId, DifficultyHistogram, Item};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tracing::debug;

/// Builds [`Category`] summaries from the backing store
pub struct AggregationEngine {
    accessor: Arc<StoreAccessor>,
    sample_size: usize,
    quality_weight: f64,
}

impl AggregationEngine {
    pub fn new(accessor: Arc<StoreAccessor>, config: &QueryConfig) -> Self {
        Self {
            accessor,
            sample_size: config.sample_size,
            quality_weight: config.sample_quality_weight,
        }
    }

    /// Summarize one category
    ///
    /// Either returns a complete summary or an error; a failed scan never
    /// yields partial counts.
    pub async fn summarize(&self, id: &CategoryId) -> Result<Category, CoreError> {
        let def = self.accessor.category_def(id)?;
        let items = self.accessor.scan_category(id).await?;

        let mut histogram = DifficultyHistogram::default();
        let mut top = TopN::new(self.sample_size);
        for item in &items {
            histogram.increment(item.difficulty);
            top.offer(item, item.composite_score(self.quality_weight));
        }

        debug!(category = %id, items = items.len(), "Category summarized");

        Ok(Category {
            id: def.id,
            display_name: def.display_name,
            total_item_count: items.len() as u64,
            difficulty_histogram: histogram,
            sample_items: top.into_sorted(),
        })
    }
}

struct Ranked {
    item: Arc<Item>,
    score: f64,
}

impl Ord for Ranked {
    /// Better-ranked entries compare as smaller: higher score, then lower id
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.item.id.cmp(&other.item.id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Bounded max-heap whose top is the worst kept entry
struct TopN {
    limit: usize,
    heap: BinaryHeap<Ranked>,
}

impl TopN {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            heap: BinaryHeap::with_capacity(limit + 1),
        }
    }

    fn offer(&mut self, item: &Arc<Item>, score: f64) {
        if self.limit == 0 {
            return;
        }
        let candidate = Ranked {
            item: Arc::clone(item),
            score,
        };
        if self.heap.len() < self.limit {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    fn into_sorted(self) -> Vec<Item> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| Item::clone(&ranked.item))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::store::{CorpusStore, SyntheticCorpus};
    use crate::store::sort::compare_composite;
    use practix_types::{CategoryDef, Difficulty};

    fn engine(store: CorpusStore, sample_size: usize) -> AggregationEngine {
        let accessor = Arc::new(StoreAccessor::new(Arc::new(store), &StoreConfig::default()));
        let config = QueryConfig {
            sample_size,
            ..QueryConfig::default()
        };
        AggregationEngine::new(accessor, &config)
    }

    fn item(id: &str, quality: f64, relevance: f64, difficulty: Difficulty) -> Item {
        Item {
            id: id.into(),
            title: id.to_string(),
            category_id: "arrays".into(),
            difficulty,
            sub_difficulty_level: 0,
            quality_score: quality,
            relevance_score: relevance,
            tag_set: Default::default(),
        }
    }

    fn arrays() -> Vec<CategoryDef> {
        vec![
            CategoryDef {
                id: "arrays".into(),
                display_name: "Arrays".into(),
            },
            CategoryDef {
                id: "empty".into(),
                display_name: "Empty".into(),
            },
        ]
    }

    #[tokio::test]
    async fn test_summarize_counts_and_samples() {
        let items = vec![
            item("d", 0.2, 0.2, Difficulty::Easy),
            item("b", 0.8, 0.6, Difficulty::Hard),
            item("a", 0.6, 0.8, Difficulty::Hard),
            item("c", 1.0, 1.0, Difficulty::Medium),
        ];
        let engine = engine(CorpusStore::from_parts(arrays(), items).unwrap(), 3);

        let summary = engine.summarize(&"arrays".into()).await.unwrap();
        assert_eq!(summary.display_name, "Arrays");
        assert_eq!(summary.total_item_count, 4);
        assert_eq!(summary.difficulty_histogram.easy, 1);
        assert_eq!(summary.difficulty_histogram.medium, 1);
        assert_eq!(summary.difficulty_histogram.hard, 2);

        // a and b tie on composite score, id breaks the tie
        let ids: Vec<_> = summary.sample_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_category_has_full_histogram() {
        let engine = engine(CorpusStore::from_parts(arrays(), Vec::new()).unwrap(), 5);
        let summary = engine.summarize(&"empty".into()).await.unwrap();

        assert_eq!(summary.total_item_count, 0);
        assert_eq!(summary.difficulty_histogram.total(), 0);
        assert!(summary.sample_items.is_empty());

        let json = serde_json::to_value(&summary.difficulty_histogram).unwrap();
        assert_eq!(json["medium"], 0);
    }

    #[tokio::test]
    async fn test_unknown_category() {
        let engine = engine(CorpusStore::from_parts(arrays(), Vec::new()).unwrap(), 5);
        let err = engine.summarize(&"nope".into()).await.unwrap_err();
        assert!(matches!(err, CoreError::CategoryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_sample_matches_full_sort() {
        let corpus = SyntheticCorpus::new(3).category("big", "Big", 2_000);
        let mut expected = corpus.items();
        expected.sort_by(|a, b| compare_composite(0.5, a, b));
        expected.truncate(5);

        let engine = engine(CorpusStore::from_snapshot(corpus.build().unwrap()), 5);
        let summary = engine.summarize(&"big".into()).await.unwrap();
        assert_eq!(summary.sample_items, expected);
    }
}
