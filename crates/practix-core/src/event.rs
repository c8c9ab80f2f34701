//! Invalidation and health notices over `tokio::sync::broadcast`
//!
//! The invalidation listener turns [`DataEvent`]s into cache purges; the
//! SSE endpoint forwards every one of them to connected clients.

use practix_types::{CategoryId, UserId};
use tokio::sync::broadcast;

/// Subscribers that fall this far behind see `Lagged`
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum DataEvent {
    /// A user's progress marker changed; only that user's keys are stale
    ProgressUpdated {
        user_id: UserId,
        category_id: CategoryId,
    },
    /// The corpus was re-imported; every global aggregate is stale
    CorpusReloaded { items: usize },
    /// Cached entries under a key prefix were purged
    CacheInvalidated { prefix: String },
    /// The shared cache tier stopped answering and is bypassed
    SharedTierDegraded { reason: String },
    WatcherError(String),
}

impl DataEvent {
    /// SSE event type
    pub fn name(&self) -> &'static str {
        match self {
            DataEvent::ProgressUpdated { .. } => "progress_updated",
            DataEvent::CorpusReloaded { .. } => "corpus_reloaded",
            DataEvent::CacheInvalidated { .. } => "cache_invalidated",
            DataEvent::SharedTierDegraded { .. } => "shared_tier_degraded",
            DataEvent::WatcherError(_) => "watcher_error",
        }
    }
}

/// Cloneable handle; every clone publishes into the same channel
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DataEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Publish to every subscriber; a bus nobody listens to drops the event
    pub fn publish(&self, event: DataEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_events_in_order() {
        let bus = EventBus::default_capacity();
        let mut rx = bus.subscribe();

        bus.publish(DataEvent::CorpusReloaded { items: 551 });
        bus.publish(DataEvent::ProgressUpdated {
            user_id: "u1".into(),
            category_id: "graphs".into(),
        });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.name(), "corpus_reloaded");

        let second = rx.recv().await.unwrap();
        assert!(
            matches!(second, DataEvent::ProgressUpdated { ref user_id, .. } if user_id == "u1")
        );
        assert_eq!(second.name(), "progress_updated");
    }

    #[tokio::test]
    async fn test_clones_share_one_channel() {
        let bus = EventBus::default_capacity();
        let publisher = bus.clone();
        let mut rx1 = bus.subscribe();
        let mut rx2 = publisher.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        publisher.publish(DataEvent::CacheInvalidated {
            prefix: "cat:".to_string(),
        });

        assert!(matches!(rx1.recv().await.unwrap(), DataEvent::CacheInvalidated { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), DataEvent::CacheInvalidated { .. }));
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for items in 0..4 {
            bus.publish(DataEvent::CorpusReloaded { items });
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
    }
}
