//! Total orderings over items
//!
//! Every ordering ends with `id` ascending so that pagination over a fixed
//! signature is stable across pages.

use practix_types::{Item, SortField, SortOrder, SortSpec};
use std::cmp::Ordering;

/// Order for category listings
pub fn compare_by_spec(spec: &SortSpec, a: &Item, b: &Item) -> Ordering {
    let primary = match spec.field {
        SortField::Quality => a.quality_score.total_cmp(&b.quality_score),
        SortField::Relevance => a.relevance_score.total_cmp(&b.relevance_score),
        SortField::Difficulty => (a.difficulty.rank(), a.sub_difficulty_level)
            .cmp(&(b.difficulty.rank(), b.sub_difficulty_level)),
        SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
    };
    let primary = match spec.order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

/// Order for search results: relevance desc, quality desc, id asc
pub fn compare_search_rank(a: &Item, b: &Item) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| b.quality_score.total_cmp(&a.quality_score))
        .then_with(|| a.id.cmp(&b.id))
}

/// Order for category samples: composite score desc, id asc
pub fn compare_composite(quality_weight: f64, a: &Item, b: &Item) -> Ordering {
    b.composite_score(quality_weight)
        .total_cmp(&a.composite_score(quality_weight))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use practix_types::Difficulty;

    fn item(id: &str, title: &str, quality: f64, relevance: f64, difficulty: Difficulty) -> Item {
        Item {
            id: id.into(),
            title: title.to_string(),
            category_id: "c".into(),
            difficulty,
            sub_difficulty_level: 0,
            quality_score: quality,
            relevance_score: relevance,
            tag_set: Default::default(),
        }
    }

    #[test]
    fn test_ties_break_by_id_in_both_directions() {
        let a = item("a", "x", 0.5, 0.0, Difficulty::Easy);
        let b = item("b", "x", 0.5, 0.0, Difficulty::Easy);

        let desc = SortSpec::new(SortField::Quality, SortOrder::Desc);
        let asc = SortSpec::new(SortField::Quality, SortOrder::Asc);
        assert_eq!(compare_by_spec(&desc, &a, &b), Ordering::Less);
        assert_eq!(compare_by_spec(&asc, &a, &b), Ordering::Less);
    }

    #[test]
    fn test_difficulty_sort_uses_rank_then_level() {
        let mut hard = item("h", "x", 0.0, 0.0, Difficulty::Hard);
        hard.sub_difficulty_level = 1;
        let mut easy_high = item("e", "x", 0.0, 0.0, Difficulty::Easy);
        easy_high.sub_difficulty_level = 9;

        let spec = SortSpec::new(SortField::Difficulty, SortOrder::Asc);
        assert_eq!(compare_by_spec(&spec, &easy_high, &hard), Ordering::Less);
    }

    #[test]
    fn test_title_sort_is_case_insensitive() {
        let a = item("2", "apple", 0.0, 0.0, Difficulty::Easy);
        let b = item("1", "Banana", 0.0, 0.0, Difficulty::Easy);
        let spec = SortSpec::new(SortField::Title, SortOrder::Asc);
        assert_eq!(compare_by_spec(&spec, &a, &b), Ordering::Less);
    }

    #[test]
    fn test_search_rank() {
        let mut items = vec![
            item("c", "x", 0.9, 0.5, Difficulty::Easy),
            item("b", "x", 0.1, 0.9, Difficulty::Easy),
            item("a", "x", 0.9, 0.5, Difficulty::Easy),
        ];
        items.sort_by(compare_search_rank);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
