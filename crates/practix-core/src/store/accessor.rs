//! Timeout/retry wrapper around a [`BackingStore`]

use super::sort::{compare_by_spec, compare_search_rank};
use super::{BackingStore, ItemPredicate, ScanScope, SearchTerms};
use crate::config::StoreConfig;
use crate::error::CoreError;
use practix_types::{CategoryDef, CategoryId, Item, ListFilters, SearchFilters, SortSpec};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Number of attempts per primitive call (one retry)
const MAX_ATTEMPTS: u32 = 2;

/// Guarded access to the backing store
///
/// Every scan runs on the blocking pool under `timeout`. A timeout (or a
/// transient store error) is retried once after `retry_backoff`; a second
/// failure becomes [`CoreError::ServiceUnavailable`].
pub struct StoreAccessor {
    store: Arc<dyn BackingStore>,
    timeout: Duration,
    retry_backoff: Duration,
    calls: AtomicU64,
}

impl StoreAccessor {
    pub fn new(store: Arc<dyn BackingStore>, config: &StoreConfig) -> Self {
        Self {
            store,
            timeout: config.timeout(),
            retry_backoff: config.retry_backoff(),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of scan calls issued to the backing store (retries included)
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn category_defs(&self) -> Vec<CategoryDef> {
        self.store.category_defs()
    }

    pub fn category_def(&self, id: &CategoryId) -> Result<CategoryDef, CoreError> {
        self.store
            .category_defs()
            .into_iter()
            .find(|def| &def.id == id)
            .ok_or_else(|| CoreError::category_not_found(id.as_str()))
    }

    pub fn item_count(&self) -> usize {
        self.store.item_count()
    }

    /// Every item of one category, in storage order
    pub async fn scan_category(&self, id: &CategoryId) -> Result<Vec<Arc<Item>>, CoreError> {
        self.scan("scan_category", ScanScope::Category(id.clone()), ItemPredicate::any())
            .await
    }

    /// Filtered items of one category in listing order
    pub async fn filtered_sorted(
        &self,
        id: &CategoryId,
        filters: &ListFilters,
        sort: &SortSpec,
    ) -> Result<Vec<Item>, CoreError> {
        let predicate = ItemPredicate::any().with_difficulty(filters.difficulty);
        let matched = self
            .scan("list", ScanScope::Category(id.clone()), predicate)
            .await?;

        let mut items: Vec<Item> = matched.iter().map(|item| Item::clone(item)).collect();
        items.sort_by(|a, b| compare_by_spec(sort, a, b));
        Ok(items)
    }

    /// Items matching every search term, in rank order
    pub async fn search(
        &self,
        terms: &SearchTerms,
        filters: &SearchFilters,
    ) -> Result<Vec<Item>, CoreError> {
        let scope = match &filters.category {
            Some(id) => ScanScope::Category(id.clone()),
            None => ScanScope::All,
        };
        let predicate = ItemPredicate::any()
            .with_difficulty(filters.difficulty)
            .with_terms(terms.clone());
        let matched = self.scan("search", scope, predicate).await?;

        let mut items: Vec<Item> = matched.iter().map(|item| Item::clone(item)).collect();
        items.sort_by(compare_search_rank);
        Ok(items)
    }

    async fn scan(
        &self,
        operation: &'static str,
        scope: ScanScope,
        predicate: ItemPredicate,
    ) -> Result<Vec<Arc<Item>>, CoreError> {
        let scope = Arc::new(scope);
        let predicate = Arc::new(predicate);
        let mut last_error = None;

        for attempt in 1..=MAX_ATTEMPTS {
            self.calls.fetch_add(1, Ordering::Relaxed);

            let store = Arc::clone(&self.store);
            let task_scope = Arc::clone(&scope);
            let task_predicate = Arc::clone(&predicate);
            let task =
                tokio::task::spawn_blocking(move || store.scan(&task_scope, &task_predicate));

            let error = match tokio::time::timeout(self.timeout, task).await {
                Ok(Ok(Ok(items))) => {
                    debug!(operation, attempt, items = items.len(), "Backing store scan");
                    return Ok(items);
                }
                Ok(Ok(Err(e))) if e.is_transient() => e,
                Ok(Ok(Err(e))) => return Err(e),
                Ok(Err(join_error)) => {
                    return Err(CoreError::BackingStoreFailed {
                        message: join_error.to_string(),
                    })
                }
                Err(_) => CoreError::BackingStoreTimeout {
                    operation: operation.to_string(),
                    timeout: self.timeout,
                },
            };

            warn!(operation, attempt, error = %error, "Backing store call failed");
            last_error = Some(error);
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(self.retry_backoff).await;
            }
        }

        debug!(operation, last_error = ?last_error, "Backing store retries exhausted");
        Err(CoreError::ServiceUnavailable {
            operation: operation.to_string(),
        })
    }
}
