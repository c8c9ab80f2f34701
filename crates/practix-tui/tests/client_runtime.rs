//! Client runtime behaviour against scripted catalogs
//!
//! Timer-driven tests run on a paused clock so debounce and backoff
//! windows are exact.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use practix_core::{CoreError, CorpusStore, QueryService, SyntheticCorpus};
use practix_tui::client::{ListRequest, SearchRequest};
use practix_tui::state::{ClientSettings, ViewStatus};
use practix_tui::{CatalogClient, ClientState, LocalCatalogClient, Msg, Runtime};
use practix_types::{Category, CategoryMastery, DifficultyHistogram, Page, UserId};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn empty_page() -> Page {
    Page {
        category_id: None,
        filter_signature: String::new(),
        page_number: 1,
        items: Vec::new(),
        has_next: false,
        total_matching: 0,
    }
}

fn category(id: &str) -> Category {
    Category {
        id: id.into(),
        display_name: id.to_string(),
        total_item_count: 0,
        difficulty_histogram: DifficultyHistogram::default(),
        sample_items: Vec::new(),
    }
}

/// Records every search query it receives
#[derive(Default)]
struct RecordingClient {
    searches: Mutex<Vec<String>>,
}

impl CatalogClient for RecordingClient {
    fn overview(&self) -> BoxFuture<'_, Result<Vec<Category>, CoreError>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn list(&self, _request: ListRequest) -> BoxFuture<'_, Result<Page, CoreError>> {
        Box::pin(async { Ok(empty_page()) })
    }

    fn search(&self, request: SearchRequest) -> BoxFuture<'_, Result<Page, CoreError>> {
        self.searches.lock().push(request.query);
        Box::pin(async { Ok(empty_page()) })
    }

    fn mastery(&self, _user: UserId) -> BoxFuture<'_, Result<Vec<CategoryMastery>, CoreError>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Overview fails with a transient error `failures` times, then succeeds
struct FlakyClient {
    failures: u32,
    calls: AtomicU32,
}

impl CatalogClient for FlakyClient {
    fn overview(&self) -> BoxFuture<'_, Result<Vec<Category>, CoreError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let failures = self.failures;
        Box::pin(async move {
            if call < failures {
                Err(CoreError::ServiceUnavailable {
                    operation: "overview".to_string(),
                })
            } else {
                Ok(vec![category("graphs")])
            }
        })
    }

    fn list(&self, _request: ListRequest) -> BoxFuture<'_, Result<Page, CoreError>> {
        Box::pin(async { Ok(empty_page()) })
    }

    fn search(&self, _request: SearchRequest) -> BoxFuture<'_, Result<Page, CoreError>> {
        Box::pin(async { Ok(empty_page()) })
    }

    fn mastery(&self, _user: UserId) -> BoxFuture<'_, Result<Vec<CategoryMastery>, CoreError>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

#[tokio::test(start_paused = true)]
async fn test_typing_burst_sends_one_search() {
    let client = Arc::new(RecordingClient::default());
    let mut runtime = Runtime::new(client.clone());
    let mut state = ClientState::new(ClientSettings::default(), None);

    for text in ["g", "gr", "gra", "grap", "graph"] {
        state = runtime.dispatch(state, Msg::SearchInput(text.to_string()));
        sleep(Duration::from_millis(50)).await;
        (state, _) = runtime.drain(state);
    }
    assert!(client.searches.lock().is_empty());

    sleep(Duration::from_millis(400)).await;
    (state, _) = runtime.drain(state);
    sleep(Duration::from_millis(10)).await;
    (state, _) = runtime.drain(state);

    assert_eq!(*client.searches.lock(), vec!["graph".to_string()]);
    assert_eq!(state.search.query, "graph");
    assert_eq!(state.search.view.status(), ViewStatus::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_retry_with_backoff() {
    let client = Arc::new(FlakyClient {
        failures: 2,
        calls: AtomicU32::new(0),
    });
    let mut runtime = Runtime::new(client.clone());
    let start = Instant::now();

    let mut state = runtime.dispatch(
        ClientState::new(ClientSettings::default(), None),
        Msg::LoadOverview,
    );
    while state.overview.categories.is_empty() && state.overview.error.is_none() {
        let msg = runtime.recv().await.expect("runtime channel open");
        state = runtime.dispatch(state, msg);
    }

    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    assert_eq!(state.overview.categories.len(), 1);
    assert!(state.overview.error.is_none());
    // 200ms then 400ms of backoff
    assert!(start.elapsed() >= Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_error() {
    let client = Arc::new(FlakyClient {
        failures: u32::MAX,
        calls: AtomicU32::new(0),
    });
    let mut runtime = Runtime::new(client.clone());

    let mut state = runtime.dispatch(
        ClientState::new(ClientSettings::default(), None),
        Msg::LoadOverview,
    );
    while state.overview.error.is_none() {
        let msg = runtime.recv().await.expect("runtime channel open");
        state = runtime.dispatch(state, msg);
    }

    // First try plus three retries
    assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    assert!(state.overview.in_flight.is_none());
}

#[tokio::test]
async fn test_expand_loads_first_page_from_local_service() {
    let snapshot = SyntheticCorpus::new(3)
        .category("graphs", "Graphs", 30)
        .build()
        .unwrap();
    let service = Arc::new(QueryService::for_corpus(Arc::new(CorpusStore::from_snapshot(snapshot))).build());
    let mut runtime = Runtime::new(Arc::new(LocalCatalogClient::new(service)));
    let initial = ClientState::new(ClientSettings::default(), None);

    let state = tokio::time::timeout(Duration::from_secs(5), async move {
        let mut state = runtime.dispatch(initial, Msg::Expand("graphs".into()));
        loop {
            let msg = runtime.recv().await.expect("runtime channel open");
            state = runtime.dispatch(state, msg);
            if state.listing(&"graphs".into()).is_some_and(|v| !v.is_loading()) {
                return state;
            }
        }
    })
    .await
    .expect("listing loaded");

    let view = state.listing(&"graphs".into()).unwrap();
    assert_eq!(view.status(), ViewStatus::Ready);
    assert_eq!(view.items.len(), 20);
    assert_eq!(view.total_count, 30);
    assert!(view.has_next);
}
