//! Category summary models

use super::item::{CategoryId, Difficulty, Item};
use serde::{Deserialize, Serialize};

/// Static definition of a category as declared by the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDef {
    pub id: CategoryId,
    pub display_name: String,
}

/// Item counts per difficulty bucket
///
/// Serializes as `{"easy": n, "medium": n, "hard": n}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyHistogram {
    pub easy: u64,
    pub medium: u64,
    pub hard: u64,
}

impl DifficultyHistogram {
    pub fn get(&self, difficulty: Difficulty) -> u64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    pub fn increment(&mut self, difficulty: Difficulty) {
        match difficulty {
            Difficulty::Easy => self.easy += 1,
            Difficulty::Medium => self.medium += 1,
            Difficulty::Hard => self.hard += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.easy + self.medium + self.hard
    }

    /// Buckets in rank order
    pub fn iter(&self) -> impl Iterator<Item = (Difficulty, u64)> + '_ {
        Difficulty::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

/// Aggregated, user-agnostic summary of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub display_name: String,
    pub total_item_count: u64,
    pub difficulty_histogram: DifficultyHistogram,
    /// Top-N items by composite score, ties broken by id
    pub sample_items: Vec<Item>,
}

/// Per-user mastery overlay for one category
///
/// Kept apart from [`Category`] so the global summary cache never embeds
/// user data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMastery {
    pub category_id: CategoryId,
    pub mastered_items: u64,
    pub total_items: u64,
    pub mastery_percent: f64,
}

impl CategoryMastery {
    pub fn new(category_id: CategoryId, mastered_items: u64, total_items: u64) -> Self {
        let mastery_percent = if total_items == 0 {
            0.0
        } else {
            (mastered_items as f64 / total_items as f64) * 100.0
        };
        Self {
            category_id,
            mastered_items,
            total_items,
            mastery_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_serializes_as_map() {
        let mut histogram = DifficultyHistogram::default();
        histogram.increment(Difficulty::Easy);
        histogram.increment(Difficulty::Hard);
        histogram.increment(Difficulty::Hard);

        let json = serde_json::to_value(histogram).unwrap();
        assert_eq!(json, serde_json::json!({"easy": 1, "medium": 0, "hard": 2}));
        assert_eq!(histogram.total(), 3);
    }

    #[test]
    fn test_mastery_percent_empty_category() {
        let mastery = CategoryMastery::new("c".into(), 0, 0);
        assert_eq!(mastery.mastery_percent, 0.0);

        let mastery = CategoryMastery::new("c".into(), 1, 4);
        assert_eq!(mastery.mastery_percent, 25.0);
    }
}
