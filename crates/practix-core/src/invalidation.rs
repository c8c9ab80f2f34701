//! Event-driven cache invalidation
//!
//! Maps invalidation triggers published on the [`EventBus`] by other
//! components to cache purges. A `ProgressUpdated` from the user-tracking
//! collaborator purges that user's keys only.
//!
//! Operations on [`QueryService`] itself (`record_progress`,
//! `reload_corpus`) purge before they return and publish notices only, so
//! `CacheInvalidated` and `CorpusReloaded` are not acted on here.

use crate::event::DataEvent;
use crate::query::QueryService;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn the listener task; abort the handle to stop it
pub fn spawn_listener(service: Arc<QueryService>) -> JoinHandle<()> {
    let mut rx = service.events().subscribe();

    tokio::spawn(async move {
        info!("Invalidation listener started");
        loop {
            match rx.recv().await {
                Ok(event) => apply(&service, event).await,
                Err(RecvError::Lagged(skipped)) => {
                    // Missed triggers cannot be replayed; drop everything global
                    warn!(skipped, "Invalidation listener lagged, purging global keys");
                    service.invalidate_all().await;
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Invalidation listener stopped");
    })
}

async fn apply(service: &QueryService, event: DataEvent) {
    match event {
        DataEvent::ProgressUpdated {
            user_id,
            category_id,
        } => {
            debug!(user = %user_id, category = %category_id, "Progress updated");
            service.invalidate_user(&user_id).await;
        }
        DataEvent::CorpusReloaded { .. }
        | DataEvent::CacheInvalidated { .. }
        | DataEvent::SharedTierDegraded { .. }
        | DataEvent::WatcherError(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{keys, KeyState};
    use crate::store::{CorpusStore, SyntheticCorpus};
    use practix_types::{ListFilters, SortSpec};
    use std::time::Duration;

    fn service() -> Arc<QueryService> {
        let corpus = SyntheticCorpus::new(5).category("arrays", "Arrays", 30);
        let store = Arc::new(CorpusStore::from_snapshot(corpus.build().unwrap()));
        Arc::new(QueryService::builder(store).build())
    }

    async fn wait_for_state(service: &QueryService, key: &str, expected: KeyState) {
        for _ in 0..50 {
            if service.key_state(key).await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("key {} never reached {:?}", key, expected);
    }

    #[tokio::test]
    async fn test_progress_event_purges_only_user_keys() {
        let service = service();
        let _listener = spawn_listener(Arc::clone(&service));

        service.mastery(&"u1".into()).await.unwrap();
        service.mastery(&"u2".into()).await.unwrap();
        service.category(&"arrays".into()).await.unwrap();

        service.events().publish(DataEvent::ProgressUpdated {
            user_id: "u1".into(),
            category_id: "arrays".into(),
        });

        wait_for_state(&service, &keys::user_mastery(&"u1".into()), KeyState::Invalidated).await;
        assert_eq!(
            service.key_state(&keys::user_mastery(&"u2".into())).await,
            KeyState::Cached
        );
        assert_eq!(
            service
                .key_state(&keys::category_summary(&"arrays".into()))
                .await,
            KeyState::Cached
        );
    }

    #[tokio::test]
    async fn test_record_progress_purges_user_keys_once() {
        let service = service();
        let _listener = spawn_listener(Arc::clone(&service));
        let mut rx = service.events().subscribe();

        let before = service.mastery(&"u1".into()).await.unwrap();
        let item = service.overview().await.unwrap()[0].sample_items[0].clone();
        service
            .record_progress(
                practix_types::ProgressMarker {
                    user_id: "u1".into(),
                    item_id: item.id,
                    confidence_level: 5,
                    updated_at: chrono::Utc::now(),
                },
                "arrays".into(),
            )
            .await
            .unwrap();

        let after = service.mastery(&"u1".into()).await.unwrap();
        assert_eq!(after[0].mastered_items, before[0].mastered_items + 1);

        assert!(matches!(
            rx.recv().await.unwrap(),
            DataEvent::CacheInvalidated { ref prefix } if *prefix == keys::user_prefix(&"u1".into())
        ));
        // Give the listener a chance to act on anything it received
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(service.cache_stats()["user"].invalidations, 1);
    }

    #[tokio::test]
    async fn test_corpus_reloaded_notice_is_not_a_purge() {
        let service = service();
        let _listener = spawn_listener(Arc::clone(&service));

        let filters = ListFilters::default();
        let sort = SortSpec::default();
        service
            .list(&"arrays".into(), &filters, &sort, 1, None)
            .await
            .unwrap();

        service
            .events()
            .publish(DataEvent::CorpusReloaded { items: 30 });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let page_key = keys::list_page(&"arrays".into(), &filters, &sort, 1, 20);
        assert_eq!(service.key_state(&page_key).await, KeyState::Cached);
    }
}
