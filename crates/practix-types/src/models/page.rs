//! Paginated result slices

use super::item::{CategoryId, Item};
use serde::{Deserialize, Serialize};

/// A bounded, ordered slice of a filtered/sorted item set
///
/// Materialized per request; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Category the page belongs to (`None` for search results)
    pub category_id: Option<CategoryId>,
    pub filter_signature: String,
    /// 1-based page number
    pub page_number: u32,
    pub items: Vec<Item>,
    pub has_next: bool,
    pub total_matching: u64,
}

impl Page {
    /// Slice `page_number` out of an already filtered and ordered sequence
    ///
    /// Pages past the end come back empty with `has_next = false`.
    pub fn slice(
        category_id: Option<CategoryId>,
        filter_signature: String,
        page_number: u32,
        page_size: u32,
        ordered: &[Item],
    ) -> Self {
        let total = ordered.len() as u64;
        let start = (page_number.saturating_sub(1) as u64).saturating_mul(page_size as u64);
        let end = start.saturating_add(page_size as u64).min(total);
        let items = if start >= total {
            Vec::new()
        } else {
            ordered[start as usize..end as usize].to_vec()
        };

        Self {
            category_id,
            filter_signature,
            page_number,
            items,
            has_next: (page_number as u64).saturating_mul(page_size as u64) < total,
            total_matching: total,
        }
    }

    /// An empty result ("no results" is not an error)
    pub fn empty(category_id: Option<CategoryId>, filter_signature: String, page_number: u32) -> Self {
        Self {
            category_id,
            filter_signature,
            page_number,
            items: Vec::new(),
            has_next: false,
            total_matching: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    fn items(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item {
                id: format!("item-{:04}", i).into(),
                title: format!("Item {}", i),
                category_id: "c".into(),
                difficulty: Difficulty::Easy,
                sub_difficulty_level: 0,
                quality_score: 0.5,
                relevance_score: 0.5,
                tag_set: Default::default(),
            })
            .collect()
    }

    #[test]
    fn test_slice_last_partial_page() {
        let all = items(551);
        let page = Page::slice(Some("c".into()), "difficulty=any".into(), 28, 20, &all);

        assert_eq!(page.items.len(), 11);
        assert!(!page.has_next);
        assert_eq!(page.total_matching, 551);
        assert_eq!(page.items[0].id, "item-0540");
    }

    #[test]
    fn test_slice_past_end_is_empty() {
        let all = items(5);
        let page = Page::slice(None, String::new(), 3, 5, &all);
        assert!(page.is_empty());
        assert!(!page.has_next);
        assert_eq!(page.total_matching, 5);
    }

    #[test]
    fn test_has_next_exact_boundary() {
        let all = items(40);
        assert!(Page::slice(None, String::new(), 1, 20, &all).has_next);
        assert!(!Page::slice(None, String::new(), 2, 20, &all).has_next);
    }
}
