//! Client state manager
//!
//! [`update`] is a pure reducer: it takes the current state, one message and
//! the current instant, and returns the next state plus the effects the
//! runtime must execute. Every fetch carries a generation; a result whose
//! generation no longer matches the resource's in-flight request is dropped.

use crate::client::{ListRequest, SearchRequest};
use practix_core::config::ClientConfig;
use practix_core::CoreError;
use practix_types::{
    view_signature, Category, CategoryId, CategoryMastery, Difficulty, Item, ListFilters, Page,
    SearchFilters, SortSpec, UserId, DEFAULT_PAGE_SIZE,
};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::time::Instant;

/// Bounded exponential backoff for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based); `None` once exhausted
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.max))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub freshness: Duration,
    pub search_debounce: Duration,
    pub retry: RetryPolicy,
    pub page_size: u32,
}

impl From<&ClientConfig> for ClientSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            freshness: Duration::from_secs(config.freshness_secs),
            search_debounce: Duration::from_millis(config.search_debounce_ms),
            retry: RetryPolicy {
                attempts: config.retry_attempts,
                base: Duration::from_millis(config.retry_base_ms),
                max: Duration::from_millis(config.retry_max_ms),
            },
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// One listing view: a category under a filter and an ordering
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingKey {
    pub category: CategoryId,
    pub filters: ListFilters,
    pub sort: SortSpec,
}

impl ListingKey {
    pub fn signature(&self) -> String {
        view_signature(&self.filters, &self.sort)
    }

    fn request(&self, page: u32, page_size: u32) -> ListRequest {
        ListRequest {
            category: self.category.clone(),
            filters: self.filters,
            sort: self.sort,
            page,
            page_size,
        }
    }
}

/// Outstanding request for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub generation: u64,
    pub page: u32,
    /// Retries already scheduled for this request
    pub attempt: u32,
}

/// What a paged view should currently display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    /// Never requested
    Idle,
    /// First page on its way
    Loading,
    Ready,
    /// Loaded, no results
    Empty,
    /// Last-known-good data kept after a failed refresh
    Stale,
    /// Failed with nothing to fall back to
    Failed,
}

/// Accumulated pages of one resource (a listing view or search results)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagedView {
    pub items: Vec<Item>,
    pub page: u32,
    pub has_next: bool,
    pub total_count: u64,
    pub last_updated: Option<Instant>,
    pub in_flight: Option<InFlight>,
    pub stale: bool,
    pub error: Option<String>,
    /// Bumped whenever `items` is replaced rather than appended to
    pub epoch: u64,
}

impl PagedView {
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_fresh(&self, now: Instant, window: Duration) -> bool {
        self.last_updated
            .map(|at| now.saturating_duration_since(at) < window)
            .unwrap_or(false)
    }

    pub fn status(&self) -> ViewStatus {
        if self.stale {
            ViewStatus::Stale
        } else if self.error.is_some() {
            ViewStatus::Failed
        } else if self.last_updated.is_none() {
            if self.is_loading() {
                ViewStatus::Loading
            } else {
                ViewStatus::Idle
            }
        } else if self.items.is_empty() {
            ViewStatus::Empty
        } else {
            ViewStatus::Ready
        }
    }

    fn can_load_more(&self) -> bool {
        self.has_next && self.in_flight.is_none() && self.last_updated.is_some()
    }

    fn apply(&mut self, page: Page, now: Instant) {
        if page.page_number <= 1 {
            self.items = page.items;
            self.epoch += 1;
        } else {
            self.items.extend(page.items);
        }
        self.page = page.page_number;
        self.has_next = page.has_next;
        self.total_count = page.total_matching;
        self.last_updated = Some(now);
        self.in_flight = None;
        self.stale = false;
        self.error = None;
    }

    fn give_up(&mut self, err: &CoreError) {
        self.in_flight = None;
        self.error = Some(err.to_string());
        self.stale = !self.items.is_empty();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverviewState {
    pub categories: Vec<Category>,
    pub in_flight: Option<InFlight>,
    pub error: Option<String>,
    pub last_updated: Option<Instant>,
    /// Per-user overlay, merged onto `categories` when rendering
    pub mastery: HashMap<CategoryId, CategoryMastery>,
    mastery_generation: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub active: bool,
    /// Text as typed
    pub input: String,
    /// Generation of the debounce timer still waiting to fire
    pub pending: Option<u64>,
    /// Query whose results `view` holds (or is loading)
    pub query: String,
    pub filters: SearchFilters,
    pub view: PagedView,
}

impl SearchState {
    fn request(&self, page: u32, page_size: u32) -> SearchRequest {
        SearchRequest {
            query: self.query.clone(),
            filters: self.filters.clone(),
            page,
            page_size,
        }
    }
}

/// Everything the client knows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientState {
    pub settings: ClientSettings,
    pub user: Option<UserId>,
    pub overview: OverviewState,
    pub filters: ListFilters,
    pub sort: SortSpec,
    pub expanded: BTreeSet<CategoryId>,
    pub listings: HashMap<ListingKey, PagedView>,
    pub search: SearchState,
    next_generation: u64,
}

/// Resource a scheduled retry belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryTarget {
    Overview,
    Listing(ListingKey),
    Search,
}

#[derive(Debug, Clone)]
pub enum Msg {
    LoadOverview,
    OverviewLoaded {
        generation: u64,
        result: Result<Vec<Category>, CoreError>,
    },
    MasteryLoaded {
        generation: u64,
        result: Result<Vec<CategoryMastery>, CoreError>,
    },
    Expand(CategoryId),
    Collapse(CategoryId),
    LoadMore(CategoryId),
    SetDifficulty(Option<Difficulty>),
    SetSort(SortSpec),
    PageLoaded {
        key: ListingKey,
        generation: u64,
        result: Result<Page, CoreError>,
    },
    SearchInput(String),
    /// Debounce timer fired
    SearchDue { generation: u64 },
    SearchLoaded {
        generation: u64,
        result: Result<Page, CoreError>,
    },
    SearchLoadMore,
    ExitSearch,
    RetryDue { target: RetryTarget, generation: u64 },
    /// Refetch the overview and every expanded listing
    Refresh,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchOverview {
        generation: u64,
    },
    FetchMastery {
        user: UserId,
        generation: u64,
    },
    FetchPage {
        key: ListingKey,
        generation: u64,
        request: ListRequest,
    },
    FetchSearch {
        generation: u64,
        request: SearchRequest,
    },
    ScheduleSearch {
        generation: u64,
        delay: Duration,
    },
    ScheduleRetry {
        target: RetryTarget,
        generation: u64,
        delay: Duration,
    },
}

impl ClientState {
    pub fn new(settings: ClientSettings, user: Option<UserId>) -> Self {
        Self {
            settings,
            user,
            ..Self::default()
        }
    }

    /// Key of `category` under the current filters and ordering
    pub fn listing_key(&self, category: &CategoryId) -> ListingKey {
        ListingKey {
            category: category.clone(),
            filters: self.filters,
            sort: self.sort,
        }
    }

    /// The view currently shown for `category`
    pub fn listing(&self, category: &CategoryId) -> Option<&PagedView> {
        self.listings.get(&self.listing_key(category))
    }

    pub fn is_expanded(&self, category: &CategoryId) -> bool {
        self.expanded.contains(category)
    }

    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn request_overview(&mut self, effects: &mut Vec<Effect>) {
        if self.overview.in_flight.is_none() {
            let generation = self.next_generation();
            self.overview.in_flight = Some(InFlight {
                generation,
                page: 1,
                attempt: 0,
            });
            effects.push(Effect::FetchOverview { generation });
        }

        if let Some(user) = self.user.clone() {
            let generation = self.next_generation();
            self.overview.mastery_generation = Some(generation);
            effects.push(Effect::FetchMastery { user, generation });
        }
    }

    fn fetch_listing(&mut self, key: ListingKey, page: u32, effects: &mut Vec<Effect>) {
        let generation = self.next_generation();
        let request = key.request(page, self.settings.page_size);
        self.listings.entry(key.clone()).or_default().in_flight = Some(InFlight {
            generation,
            page,
            attempt: 0,
        });
        effects.push(Effect::FetchPage {
            key,
            generation,
            request,
        });
    }

    /// Fetch page 1 unless a request is already out or the data is fresh
    fn ensure_listing(&mut self, key: ListingKey, now: Instant, effects: &mut Vec<Effect>) {
        let view = self.listings.entry(key.clone()).or_default();
        if view.is_loading() || view.is_fresh(now, self.settings.freshness) {
            return;
        }
        self.fetch_listing(key, 1, effects);
    }

    fn fetch_search(&mut self, page: u32, effects: &mut Vec<Effect>) {
        let generation = self.next_generation();
        self.search.view.in_flight = Some(InFlight {
            generation,
            page,
            attempt: 0,
        });
        effects.push(Effect::FetchSearch {
            generation,
            request: self.search.request(page, self.settings.page_size),
        });
    }

    /// Load the current signature's view for every expanded category
    ///
    /// Views under the new signature that are still fresh are reused; the
    /// active search restarts with the new filters.
    fn refetch_expanded(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let keys: Vec<ListingKey> = self
            .expanded
            .iter()
            .map(|category| self.listing_key(category))
            .collect();

        for key in keys {
            self.ensure_listing(key, now, effects);
        }

        if self.search.active && !self.search.query.is_empty() {
            self.search.filters.difficulty = self.filters.difficulty;
            self.search.pending = None;
            self.search.view = PagedView::default();
            self.fetch_search(1, effects);
        }
    }

    /// Schedule the next attempt of `flight`, or report that it is exhausted
    fn next_attempt(&self, flight: InFlight, err: &CoreError) -> Option<(InFlight, Duration)> {
        if !err.is_transient() {
            return None;
        }
        let attempt = flight.attempt + 1;
        self.settings
            .retry
            .delay(attempt)
            .map(|delay| (InFlight { attempt, ..flight }, delay))
    }
}

fn matching(flight: Option<InFlight>, generation: u64) -> Option<InFlight> {
    flight.filter(|f| f.generation == generation)
}

/// Apply `msg` to `state`
pub fn update(mut state: ClientState, msg: Msg, now: Instant) -> (ClientState, Vec<Effect>) {
    let mut effects = Vec::new();

    match msg {
        Msg::LoadOverview => state.request_overview(&mut effects),

        Msg::OverviewLoaded { generation, result } => {
            let Some(flight) = matching(state.overview.in_flight, generation) else {
                return (state, effects);
            };
            match result {
                Ok(categories) => {
                    state.overview.categories = categories;
                    state.overview.in_flight = None;
                    state.overview.error = None;
                    state.overview.last_updated = Some(now);
                }
                Err(err) => match state.next_attempt(flight, &err) {
                    Some((next, delay)) => {
                        state.overview.in_flight = Some(next);
                        effects.push(Effect::ScheduleRetry {
                            target: RetryTarget::Overview,
                            generation,
                            delay,
                        });
                    }
                    None => {
                        state.overview.in_flight = None;
                        state.overview.error = Some(err.to_string());
                    }
                },
            }
        }

        Msg::MasteryLoaded { generation, result } => {
            if state.overview.mastery_generation != Some(generation) {
                return (state, effects);
            }
            state.overview.mastery_generation = None;
            // The overlay is optional; a failure keeps the previous one
            if let Ok(mastery) = result {
                state.overview.mastery = mastery
                    .into_iter()
                    .map(|m| (m.category_id.clone(), m))
                    .collect();
            }
        }

        Msg::Expand(category) => {
            state.expanded.insert(category.clone());
            let key = state.listing_key(&category);
            state.ensure_listing(key, now, &mut effects);
        }

        Msg::Collapse(category) => {
            state.expanded.remove(&category);
        }

        Msg::LoadMore(category) => {
            let key = state.listing_key(&category);
            if let Some(view) = state.listings.get(&key) {
                if view.can_load_more() {
                    let next = view.page + 1;
                    state.fetch_listing(key, next, &mut effects);
                }
            }
        }

        Msg::SetDifficulty(difficulty) => {
            if state.filters.difficulty != difficulty {
                state.filters.difficulty = difficulty;
                state.refetch_expanded(now, &mut effects);
            }
        }

        Msg::SetSort(sort) => {
            if state.sort != sort {
                state.sort = sort;
                state.refetch_expanded(now, &mut effects);
            }
        }

        Msg::PageLoaded {
            key,
            generation,
            result,
        } => {
            let Some(flight) = state
                .listings
                .get(&key)
                .and_then(|view| matching(view.in_flight, generation))
            else {
                return (state, effects);
            };
            let retry = match &result {
                Err(err) => Some(state.next_attempt(flight, err)),
                Ok(_) => None,
            };
            let Some(view) = state.listings.get_mut(&key) else {
                return (state, effects);
            };

            match (result, retry) {
                (Ok(page), _) => view.apply(page, now),
                (Err(_), Some(Some((next, delay)))) => {
                    view.in_flight = Some(next);
                    effects.push(Effect::ScheduleRetry {
                        target: RetryTarget::Listing(key),
                        generation,
                        delay,
                    });
                }
                (Err(err), _) => view.give_up(&err),
            }
        }

        Msg::SearchInput(text) => {
            let generation = state.next_generation();
            state.search.active = true;
            state.search.input = text;
            state.search.pending = Some(generation);
            // Supersede whatever the previous query still has outstanding
            state.search.view.in_flight = None;
            effects.push(Effect::ScheduleSearch {
                generation,
                delay: state.settings.search_debounce,
            });
        }

        Msg::SearchDue { generation } => {
            if state.search.pending != Some(generation) {
                return (state, effects);
            }
            state.search.pending = None;
            state.search.query = state.search.input.trim().to_string();
            state.search.filters = SearchFilters {
                difficulty: state.filters.difficulty,
                category: None,
            };
            state.search.view = PagedView::default();
            if !state.search.query.is_empty() {
                state.fetch_search(1, &mut effects);
            }
        }

        Msg::SearchLoaded { generation, result } => {
            let Some(flight) = matching(state.search.view.in_flight, generation) else {
                return (state, effects);
            };
            match result {
                Ok(page) => state.search.view.apply(page, now),
                Err(err) => match state.next_attempt(flight, &err) {
                    Some((next, delay)) => {
                        state.search.view.in_flight = Some(next);
                        effects.push(Effect::ScheduleRetry {
                            target: RetryTarget::Search,
                            generation,
                            delay,
                        });
                    }
                    None => state.search.view.give_up(&err),
                },
            }
        }

        Msg::SearchLoadMore => {
            if state.search.view.can_load_more() {
                let next = state.search.view.page + 1;
                state.fetch_search(next, &mut effects);
            }
        }

        Msg::ExitSearch => {
            state.search = SearchState::default();
        }

        Msg::RetryDue { target, generation } => match target {
            RetryTarget::Overview => {
                if matching(state.overview.in_flight, generation).is_some() {
                    effects.push(Effect::FetchOverview { generation });
                }
            }
            RetryTarget::Listing(key) => {
                let flight = state
                    .listings
                    .get(&key)
                    .and_then(|view| matching(view.in_flight, generation));
                if let Some(flight) = flight {
                    let request = key.request(flight.page, state.settings.page_size);
                    effects.push(Effect::FetchPage {
                        key,
                        generation,
                        request,
                    });
                }
            }
            RetryTarget::Search => {
                if let Some(flight) = matching(state.search.view.in_flight, generation) {
                    effects.push(Effect::FetchSearch {
                        generation,
                        request: state.search.request(flight.page, state.settings.page_size),
                    });
                }
            }
        },

        Msg::Refresh => {
            state.request_overview(&mut effects);
            let keys: Vec<ListingKey> = state
                .expanded
                .iter()
                .map(|category| state.listing_key(category))
                .collect();
            for key in keys {
                let loading = state.listings.get(&key).map(PagedView::is_loading);
                if loading != Some(true) {
                    state.fetch_listing(key, 1, &mut effects);
                }
            }
        }
    }

    (state, effects)
}
