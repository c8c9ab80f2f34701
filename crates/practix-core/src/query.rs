//! Query service: overview, paginated listing, search and mastery
//!
//! Every read goes through a [`TieredCache`]; the backing store is only
//! reached on a miss. Parameters are validated before any store call.

use crate::aggregate::AggregationEngine;
use crate::cache::{
    keys, CacheStatsSnapshot, KeyState, MemorySharedTier, SharedTier, SharedTierClient,
    SharedTierStatus, TieredCache,
};
use crate::config::{CacheConfig, PractixConfig, QueryConfig};
use crate::error::{CoreError, LoadReport};
use crate::event::{DataEvent, EventBus};
use crate::progress::{InMemoryProgress, ProgressSource};
use crate::store::{BackingStore, CorpusStore, SearchTerms, StoreAccessor};
use practix_types::{
    view_signature, Category, CategoryId, CategoryMastery, Item, ItemId, ListFilters, Page,
    ProgressMarker, SearchFilters, SortSpec, UserId,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Service health as returned by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `ok`, or `degraded` when the corpus or shared tier is impaired
    pub status: &'static str,
    pub categories: usize,
    pub items: usize,
    pub corpus: String,
    pub store_calls: u64,
    pub cache: CacheStatsSnapshot,
    pub families: BTreeMap<&'static str, CacheStatsSnapshot>,
    pub shared_tier: SharedTierStatus,
}

/// Builder for [`QueryService`]
pub struct QueryServiceBuilder {
    store: Arc<dyn BackingStore>,
    corpus: Option<Arc<CorpusStore>>,
    config: PractixConfig,
    shared: Option<Arc<dyn SharedTier>>,
    progress: Option<Arc<dyn ProgressSource>>,
    events: Option<EventBus>,
}

impl QueryServiceBuilder {
    pub fn config(mut self, config: PractixConfig) -> Self {
        self.config = config;
        self
    }

    pub fn shared_tier(mut self, shared: Arc<dyn SharedTier>) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressSource>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> QueryService {
        let events = self.events.unwrap_or_default();
        let shared_tier = self
            .shared
            .unwrap_or_else(|| Arc::new(MemorySharedTier::new()));
        let shared = Arc::new(
            SharedTierClient::new(shared_tier, &self.config.cache).with_events(events.clone()),
        );
        let accessor = Arc::new(StoreAccessor::new(self.store, &self.config.store));
        let capacity = self.config.cache.local_capacity;

        QueryService {
            engine: AggregationEngine::new(Arc::clone(&accessor), &self.config.query),
            accessor,
            corpus: self.corpus,
            progress: self
                .progress
                .unwrap_or_else(|| Arc::new(InMemoryProgress::new())),
            categories: TieredCache::new("category", capacity, Arc::clone(&shared)),
            listings: TieredCache::new("listing", capacity, Arc::clone(&shared)),
            pages: TieredCache::new("list", capacity, Arc::clone(&shared)),
            searches: TieredCache::new("search", capacity, Arc::clone(&shared)),
            mastery: TieredCache::new("user", capacity, Arc::clone(&shared)),
            shared,
            query_config: self.config.query,
            cache_config: self.config.cache,
            events,
        }
    }
}

/// Read side of the catalog
pub struct QueryService {
    query_config: QueryConfig,
    cache_config: CacheConfig,
    accessor: Arc<StoreAccessor>,
    engine: AggregationEngine,
    corpus: Option<Arc<CorpusStore>>,
    progress: Arc<dyn ProgressSource>,
    shared: Arc<SharedTierClient>,
    categories: TieredCache<Category>,
    listings: TieredCache<Vec<Item>>,
    pages: TieredCache<Page>,
    searches: TieredCache<Page>,
    mastery: TieredCache<Vec<CategoryMastery>>,
    events: EventBus,
}

impl QueryService {
    pub fn builder(store: Arc<dyn BackingStore>) -> QueryServiceBuilder {
        QueryServiceBuilder {
            store,
            corpus: None,
            config: PractixConfig::default(),
            shared: None,
            progress: None,
            events: None,
        }
    }

    /// Builder over a reloadable corpus store
    pub fn for_corpus(corpus: Arc<CorpusStore>) -> QueryServiceBuilder {
        let mut builder = Self::builder(Arc::clone(&corpus) as Arc<dyn BackingStore>);
        builder.corpus = Some(corpus);
        builder
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn query_config(&self) -> &QueryConfig {
        &self.query_config
    }

    /// Backing store calls issued so far
    pub fn store_calls(&self) -> u64 {
        self.accessor.calls()
    }

    /// Every category summary, in declaration order
    pub async fn overview(&self) -> Result<Vec<Category>, CoreError> {
        let defs = self.accessor.category_defs();
        let summaries =
            futures::future::try_join_all(defs.iter().map(|def| self.category(&def.id))).await?;
        Ok(summaries.iter().map(|c| Category::clone(c)).collect())
    }

    /// Summary of one category
    pub async fn category(&self, id: &CategoryId) -> Result<Arc<Category>, CoreError> {
        let key = keys::category_summary(id);
        self.categories
            .get_or_compute(&key, self.cache_config.category_ttl(), || {
                self.engine.summarize(id)
            })
            .await
    }

    /// One page of a category listing
    pub async fn list(
        &self,
        id: &CategoryId,
        filters: &ListFilters,
        sort: &SortSpec,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<Page, CoreError> {
        let page_size = self.validate_page(page, page_size)?;
        self.accessor.category_def(id)?;

        let key = keys::list_page(id, filters, sort, page, page_size);
        let page = self
            .pages
            .get_or_compute(&key, self.cache_config.page_ttl(), || async {
                let listing = self.listing(id, filters, sort).await?;
                Ok(Page::slice(
                    Some(id.clone()),
                    view_signature(filters, sort),
                    page,
                    page_size,
                    &listing,
                ))
            })
            .await?;
        Ok(Page::clone(&page))
    }

    /// Full ordered result set of one listing signature
    async fn listing(
        &self,
        id: &CategoryId,
        filters: &ListFilters,
        sort: &SortSpec,
    ) -> Result<Arc<Vec<Item>>, CoreError> {
        let key = keys::listing(id, filters, sort);
        self.listings
            .get_or_compute(&key, self.cache_config.page_ttl(), || {
                self.accessor.filtered_sorted(id, filters, sort)
            })
            .await
    }

    /// One page of free-text search results
    ///
    /// Queries below the minimum length return an empty page without any
    /// cache or store lookup.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<Page, CoreError> {
        let page_size = self.validate_page(page, page_size)?;
        let signature = filters.signature();

        let trimmed = query.trim();
        if trimmed.chars().count() < self.query_config.min_search_chars {
            debug!(query = trimmed, "Search query too short");
            return Ok(Page::empty(None, signature, page));
        }
        if let Some(category) = &filters.category {
            self.accessor.category_def(category)?;
        }

        let terms = SearchTerms::parse(trimmed);
        let key = keys::search_page(&terms.normalized(), filters, page, page_size);
        let page = self
            .searches
            .get_or_compute(&key, self.cache_config.search_ttl(), || async {
                let matched = self.accessor.search(&terms, filters).await?;
                Ok(Page::slice(None, signature.clone(), page, page_size, &matched))
            })
            .await?;
        Ok(Page::clone(&page))
    }

    /// Per-user mastery overlay, one entry per category
    pub async fn mastery(&self, user: &UserId) -> Result<Vec<CategoryMastery>, CoreError> {
        let key = keys::user_mastery(user);
        let overlay = self
            .mastery
            .get_or_compute(&key, self.cache_config.mastery_ttl(), || {
                self.compute_mastery(user)
            })
            .await?;
        Ok(overlay.as_ref().clone())
    }

    async fn compute_mastery(&self, user: &UserId) -> Result<Vec<CategoryMastery>, CoreError> {
        let progress = Arc::clone(&self.progress);
        let owned = user.clone();
        let markers = tokio::task::spawn_blocking(move || progress.latest_markers(&owned))
            .await
            .map_err(|e| CoreError::BackingStoreFailed {
                message: e.to_string(),
            })??;

        let mastered: HashSet<ItemId> = markers
            .into_iter()
            .filter(ProgressMarker::is_mastered)
            .map(|marker| marker.item_id)
            .collect();

        let defs = self.accessor.category_defs();
        let scans =
            futures::future::try_join_all(defs.iter().map(|def| self.accessor.scan_category(&def.id)))
                .await?;

        Ok(defs
            .into_iter()
            .zip(scans)
            .map(|(def, items)| {
                let done = items.iter().filter(|item| mastered.contains(&item.id)).count();
                CategoryMastery::new(def.id, done as u64, items.len() as u64)
            })
            .collect())
    }

    /// Accept a progress marker from the user-tracking collaborator
    ///
    /// The user's keys are purged before this returns, so the next mastery
    /// read sees the marker. Subscribers learn of it through the
    /// `CacheInvalidated` notice.
    pub async fn record_progress(
        &self,
        marker: ProgressMarker,
        category: CategoryId,
    ) -> Result<(), CoreError> {
        self.accessor.category_def(&category)?;
        let user = marker.user_id.clone();
        self.progress.record(marker)?;

        debug!(user = %user, category = %category, "Progress recorded");
        self.invalidate_user(&user).await;
        Ok(())
    }

    /// Purge one category's summary, listings and pages, plus every search
    pub async fn invalidate_category(&self, id: &CategoryId) {
        self.categories.invalidate(&keys::category_prefix(id)).await;
        self.listings.invalidate(&keys::listing_prefix(id)).await;
        self.pages.invalidate(&keys::list_prefix(id)).await;
        self.searches.invalidate(&keys::search_prefix()).await;

        self.events.publish(DataEvent::CacheInvalidated {
            prefix: keys::category_prefix(id),
        });
    }

    /// Purge every user-agnostic key
    pub async fn invalidate_all(&self) {
        self.categories
            .invalidate(&keys::family_prefix("category"))
            .await;
        self.listings
            .invalidate(&keys::family_prefix("listing"))
            .await;
        self.pages.invalidate(&keys::family_prefix("list")).await;
        self.searches.invalidate(&keys::search_prefix()).await;
        info!("All catalog cache entries invalidated");
    }

    /// Purge one user's keys only
    pub async fn invalidate_user(&self, user: &UserId) {
        let prefix = keys::user_prefix(user);
        self.mastery.invalidate(&prefix).await;
        self.events.publish(DataEvent::CacheInvalidated { prefix });
    }

    /// Re-import the corpus and drop every global cache entry
    ///
    /// Fails with [`CoreError::InvalidConfig`] when the service was not
    /// built over a [`CorpusStore`] opened from a directory.
    pub async fn reload_corpus(&self) -> Result<LoadReport, CoreError> {
        let corpus = self.corpus.as_ref().ok_or_else(|| CoreError::InvalidConfig {
            message: "catalog is not backed by a reloadable corpus".to_string(),
        })?;

        let report = corpus.reload().await;
        if !report.has_fatal_errors() {
            self.invalidate_all().await;
            self.events.publish(DataEvent::CorpusReloaded {
                items: report.items_loaded,
            });
        }
        Ok(report)
    }

    /// Lifecycle state of a cache key, resolved by its family
    pub async fn key_state(&self, key: &str) -> KeyState {
        let family = key.split(':').nth(1).unwrap_or_default();
        match family {
            "category" => self.categories.state(key).await,
            "listing" => self.listings.state(key).await,
            "list" => self.pages.state(key).await,
            "search" => self.searches.state(key).await,
            "user" => self.mastery.state(key).await,
            _ => KeyState::Empty,
        }
    }

    pub fn cache_stats(&self) -> BTreeMap<&'static str, CacheStatsSnapshot> {
        [
            (self.categories.name(), self.categories.stats()),
            (self.listings.name(), self.listings.stats()),
            (self.pages.name(), self.pages.stats()),
            (self.searches.name(), self.searches.stats()),
            (self.mastery.name(), self.mastery.stats()),
        ]
        .into_iter()
        .collect()
    }

    pub fn health(&self) -> HealthReport {
        let families = self.cache_stats();
        let cache = families
            .values()
            .fold(CacheStatsSnapshot::default(), |acc, s| acc.merge(*s));
        let shared_tier = self.shared.status();
        let corpus_state = self.corpus.as_ref().map(|c| c.degraded_state());

        let healthy = shared_tier.available
            && corpus_state.as_ref().map(|s| s.is_healthy()).unwrap_or(true);

        HealthReport {
            status: if healthy { "ok" } else { "degraded" },
            categories: self.accessor.category_defs().len(),
            items: self.accessor.item_count(),
            corpus: corpus_state
                .map(|s| s.to_string())
                .unwrap_or_else(|| "static".to_string()),
            store_calls: self.accessor.calls(),
            cache,
            families,
            shared_tier,
        }
    }

    fn validate_page(&self, page: u32, page_size: Option<u32>) -> Result<u32, CoreError> {
        if page == 0 {
            return Err(CoreError::invalid_page("page must be at least 1"));
        }
        let size = page_size.unwrap_or(self.query_config.default_page_size);
        if size == 0 || size > self.query_config.max_page_size {
            return Err(CoreError::invalid_page(format!(
                "page_size must be within 1..={}",
                self.query_config.max_page_size
            )));
        }
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SyntheticCorpus;
    use practix_types::{Difficulty, SortField, SortOrder};

    fn service() -> QueryService {
        let corpus = SyntheticCorpus::new(11)
            .category("arrays", "Arrays", 45)
            .category("graphs", "Graphs", 12);
        let store = Arc::new(CorpusStore::from_snapshot(corpus.build().unwrap()));
        QueryService::builder(store).build()
    }

    #[tokio::test]
    async fn test_overview_in_declaration_order() {
        let service = service();
        let overview = service.overview().await.unwrap();
        let ids: Vec<_> = overview.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["arrays", "graphs"]);
        assert_eq!(overview[0].total_item_count, 45);

        service.overview().await.unwrap();
        assert_eq!(service.store_calls(), 2);
    }

    #[tokio::test]
    async fn test_validation_precedes_store_calls() {
        let service = service();
        let sort = SortSpec::default();
        let filters = ListFilters::default();

        let err = service
            .list(&"arrays".into(), &filters, &sort, 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPage { .. }));

        let err = service
            .list(&"arrays".into(), &filters, &sort, 1, Some(101))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPage { .. }));

        let err = service
            .list(&"nope".into(), &filters, &sort, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CategoryNotFound { .. }));
        assert_eq!(service.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_pages_share_one_listing_scan() {
        let service = service();
        let sort = SortSpec::new(SortField::Title, SortOrder::Asc);
        let filters = ListFilters::default();

        let mut seen = Vec::new();
        for page in 1..=3 {
            let page = service
                .list(&"arrays".into(), &filters, &sort, page, Some(20))
                .await
                .unwrap();
            seen.extend(page.items.into_iter().map(|i| i.id));
        }
        assert_eq!(seen.len(), 45);
        assert_eq!(service.store_calls(), 1);
    }

    #[tokio::test]
    async fn test_short_search_is_empty_without_lookup() {
        let service = service();
        let page = service
            .search(" a ", &SearchFilters::default(), 1, None)
            .await
            .unwrap();
        assert!(page.is_empty());
        assert!(!page.has_next);
        assert_eq!(service.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_filters_by_difficulty() {
        let service = service();
        let filters = SearchFilters {
            difficulty: Some(Difficulty::Hard),
            category: None,
        };
        let page = service.search("heap", &filters, 1, Some(100)).await.unwrap();
        assert!(page
            .items
            .iter()
            .all(|i| i.difficulty == Difficulty::Hard && i.title.to_lowercase().contains("heap")));
        assert_eq!(page.category_id, None);
    }

    #[tokio::test]
    async fn test_mastery_overlay_and_user_invalidation() {
        let service = service();
        let overview = service.overview().await.unwrap();
        let first = overview[0].sample_items[0].clone();

        let before = service.mastery(&"u1".into()).await.unwrap();
        assert_eq!(before[0].mastered_items, 0);

        service
            .record_progress(
                ProgressMarker {
                    user_id: "u1".into(),
                    item_id: first.id.clone(),
                    confidence_level: 5,
                    updated_at: chrono::Utc::now(),
                },
                first.category_id.clone(),
            )
            .await
            .unwrap();

        let after = service.mastery(&"u1".into()).await.unwrap();
        assert_eq!(after[0].mastered_items, 1);
        assert_eq!(after[0].total_items, 45);

        // Global summaries are untouched by a user's progress
        let summary_key = keys::category_summary(&"arrays".into());
        assert_eq!(service.key_state(&summary_key).await, KeyState::Cached);
    }

    #[tokio::test]
    async fn test_reload_requires_corpus() {
        let service = service();
        assert!(matches!(
            service.reload_corpus().await,
            Err(CoreError::InvalidConfig { .. })
        ));
    }
}
