//! Deterministic generated corpus
//!
//! Backs `practix serve --demo`, the benches and the integration tests. The
//! same seed always yields the same items.

use super::corpus::CorpusSnapshot;
use crate::error::CoreError;
use practix_types::{CategoryDef, Difficulty, Item};
use std::collections::BTreeSet;

const TOPICS: &[&str] = &[
    "Two Pointers",
    "Sliding Window",
    "Prefix Sums",
    "Binary Search",
    "Monotonic Stack",
    "Heap",
    "Union Find",
    "Topological Sort",
    "Shortest Path",
    "Interval Merge",
    "Bit Manipulation",
    "Memoization",
];

const SHAPES: &[&str] = &["Basics", "Variant", "Challenge", "Drill", "Puzzle", "Warmup"];

const TAGS: &[&str] = &[
    "array", "string", "graph", "tree", "dp", "greedy", "math", "hashing", "sorting", "recursion",
];

/// Builder for a generated corpus
#[derive(Debug, Clone)]
pub struct SyntheticCorpus {
    categories: Vec<(CategoryDef, usize)>,
    seed: u64,
}

impl SyntheticCorpus {
    pub fn new(seed: u64) -> Self {
        Self {
            categories: Vec::new(),
            seed,
        }
    }

    /// Add a category with `count` items
    pub fn category(mut self, id: &str, display_name: &str, count: usize) -> Self {
        self.categories.push((
            CategoryDef {
                id: id.into(),
                display_name: display_name.to_string(),
            },
            count,
        ));
        self
    }

    /// A catalog shaped like a real one: ten categories, `total` items
    pub fn demo(total: usize) -> Self {
        let names = [
            ("array-processing", "Array Processing"),
            ("string-manipulation", "String Manipulation"),
            ("graphs", "Graphs"),
            ("trees", "Trees"),
            ("dynamic-programming", "Dynamic Programming"),
            ("greedy", "Greedy"),
            ("math", "Math"),
            ("sorting", "Sorting"),
            ("hashing", "Hashing"),
            ("recursion", "Recursion"),
        ];
        let per_category = total / names.len();
        let remainder = total % names.len();
        names
            .iter()
            .enumerate()
            .fold(Self::new(42), |builder, (index, (id, name))| {
                let extra = usize::from(index < remainder);
                builder.category(id, name, per_category + extra)
            })
    }

    pub fn items(&self) -> Vec<Item> {
        let mut rng = SplitMix64::new(self.seed);
        let mut items = Vec::new();

        for (def, count) in &self.categories {
            for index in 0..*count {
                let topic = TOPICS[rng.below(TOPICS.len())];
                let shape = SHAPES[rng.below(SHAPES.len())];
                let difficulty = Difficulty::ALL[rng.below(Difficulty::ALL.len())];
                let tag_set: BTreeSet<String> = (0..1 + rng.below(3))
                    .map(|_| TAGS[rng.below(TAGS.len())].to_string())
                    .collect();

                items.push(Item {
                    id: format!("{}-{:05}", def.id, index).into(),
                    title: format!("{} {} #{}", topic, shape, index + 1),
                    category_id: def.id.clone(),
                    difficulty,
                    sub_difficulty_level: rng.below(10) as u8,
                    // Two decimals so ties actually occur
                    quality_score: rng.below(101) as f64 / 100.0,
                    relevance_score: rng.below(101) as f64 / 100.0,
                    tag_set,
                });
            }
        }
        items
    }

    pub fn defs(&self) -> Vec<CategoryDef> {
        self.categories.iter().map(|(def, _)| def.clone()).collect()
    }

    pub fn build(&self) -> Result<CorpusSnapshot, CoreError> {
        CorpusSnapshot::from_parts(self.defs(), self.items())
    }
}

/// Small deterministic PRNG (splitmix64)
struct SplitMix64(u64);

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let corpus = SyntheticCorpus::new(7).category("a", "A", 50);
        assert_eq!(corpus.items(), corpus.items());
        assert_eq!(corpus.items().len(), 50);
    }

    #[test]
    fn test_demo_distributes_total() {
        let corpus = SyntheticCorpus::demo(1003);
        assert_eq!(corpus.defs().len(), 10);
        assert_eq!(corpus.items().len(), 1003);
    }
}
