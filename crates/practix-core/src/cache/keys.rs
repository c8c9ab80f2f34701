//! Cache key construction
//!
//! Keys are versioned and `:`-separated. Category ids, user ids and search
//! text come from outside and may contain `:`, so each is percent-encoded
//! and a key prefix always ends at a component boundary.

use practix_types::{CategoryId, ListFilters, SearchFilters, SortSpec, UserId};

/// Bump when the serialized shape of any cached value changes
pub const KEY_VERSION: &str = "v1";

pub fn category_summary(id: &CategoryId) -> String {
    format!("{KEY_VERSION}:category:{}:summary", encode_component(id.as_str()))
}

/// Full ordered result set of one listing signature
pub fn listing(id: &CategoryId, filters: &ListFilters, sort: &SortSpec) -> String {
    format!(
        "{KEY_VERSION}:listing:{}:{}:{}",
        encode_component(id.as_str()),
        filters.signature(),
        sort.signature()
    )
}

pub fn list_page(
    id: &CategoryId,
    filters: &ListFilters,
    sort: &SortSpec,
    page: u32,
    page_size: u32,
) -> String {
    format!(
        "{KEY_VERSION}:list:{}:{}:{}:p{page}:n{page_size}",
        encode_component(id.as_str()),
        filters.signature(),
        sort.signature()
    )
}

pub fn search_page(normalized_query: &str, filters: &SearchFilters, page: u32, page_size: u32) -> String {
    format!(
        "{KEY_VERSION}:search:{}:{}:p{page}:n{page_size}",
        encode_component(normalized_query),
        filters.signature()
    )
}

pub fn user_mastery(user: &UserId) -> String {
    format!("{KEY_VERSION}:user:{}:mastery", encode_component(user.as_str()))
}

pub fn category_prefix(id: &CategoryId) -> String {
    format!("{KEY_VERSION}:category:{}:", encode_component(id.as_str()))
}

pub fn listing_prefix(id: &CategoryId) -> String {
    format!("{KEY_VERSION}:listing:{}:", encode_component(id.as_str()))
}

pub fn list_prefix(id: &CategoryId) -> String {
    format!("{KEY_VERSION}:list:{}:", encode_component(id.as_str()))
}

pub fn search_prefix() -> String {
    format!("{KEY_VERSION}:search:")
}

pub fn user_prefix(user: &UserId) -> String {
    format!("{KEY_VERSION}:user:{}:", encode_component(user.as_str()))
}

/// Prefix of every key in one family (`category`, `listing`, `list`, `search`, `user`)
pub fn family_prefix(family: &str) -> String {
    format!("{KEY_VERSION}:{family}:")
}

fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            ':' => encoded.push_str("%3A"),
            c => encoded.push(c),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use practix_types::{Difficulty, SortField, SortOrder};

    #[test]
    fn test_list_key_is_deterministic() {
        let filters = ListFilters {
            difficulty: Some(Difficulty::Easy),
        };
        let sort = SortSpec::new(SortField::Title, SortOrder::Asc);
        let key = list_page(&"graphs".into(), &filters, &sort, 3, 20);
        assert_eq!(key, "v1:list:graphs:difficulty=easy:title:asc:p3:n20");
        assert!(key.starts_with(&list_prefix(&"graphs".into())));
        assert!(!key.starts_with(&listing_prefix(&"graphs".into())));
    }

    #[test]
    fn test_category_prefix_does_not_match_longer_ids() {
        let other = category_summary(&"graphs".into());
        assert!(!other.starts_with(&category_prefix(&"graph".into())));
        assert!(other.starts_with(&category_prefix(&"graphs".into())));
    }

    #[test]
    fn test_ids_with_separators_do_not_share_prefixes() {
        let nested_user = user_mastery(&"u1:x".into());
        assert_eq!(nested_user, "v1:user:u1%3Ax:mastery");
        assert!(!nested_user.starts_with(&user_prefix(&"u1".into())));
        assert!(nested_user.starts_with(&user_prefix(&"u1:x".into())));

        let nested_category = category_summary(&"a:b".into());
        assert!(!nested_category.starts_with(&category_prefix(&"a".into())));
        let page = list_page(&"a:b".into(), &ListFilters::default(), &SortSpec::default(), 1, 20);
        assert!(!page.starts_with(&list_prefix(&"a".into())));
        assert!(page.starts_with(&list_prefix(&"a:b".into())));
    }

    #[test]
    fn test_search_query_is_encoded() {
        let key = search_page("a:b 100%", &SearchFilters::default(), 1, 20);
        assert_eq!(
            key,
            "v1:search:a%3Ab 100%25:difficulty=any;category=any:p1:n20"
        );
    }

    #[test]
    fn test_user_keys_are_outside_global_namespace() {
        let key = user_mastery(&"u1".into());
        for family in ["category", "listing", "list", "search"] {
            assert!(!key.starts_with(&family_prefix(family)));
        }
        assert!(key.starts_with(&user_prefix(&"u1".into())));
    }
}
