//! Server-Sent Events for invalidation notices

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use practix_core::{DataEvent, EventBus};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Stream every bus event as `event: <name>` with a JSON body
///
/// Events a lagging client missed are skipped.
pub fn create_sse_stream(event_bus: EventBus) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = event_bus.subscribe();
    let stream = BroadcastStream::new(rx);

    let sse_stream = stream.filter_map(|result: Result<DataEvent, _>| {
        result
            .ok()
            .map(|event: DataEvent| Ok(Event::default().event(event.name()).data(payload(&event))))
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

/// JSON body of one event
pub fn payload(event: &DataEvent) -> String {
    let value = match event {
        DataEvent::ProgressUpdated {
            user_id,
            category_id,
        } => json!({ "user_id": user_id, "category_id": category_id }),
        DataEvent::CorpusReloaded { items } => json!({ "items": items }),
        DataEvent::CacheInvalidated { prefix } => json!({ "prefix": prefix }),
        DataEvent::SharedTierDegraded { reason } => json!({ "reason": reason }),
        DataEvent::WatcherError(message) => json!({ "message": message }),
    };
    value.to_string()
}
