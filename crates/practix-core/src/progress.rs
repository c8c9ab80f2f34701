//! Per-user progress markers
//!
//! Progress is owned by the user-tracking collaborator; this module only
//! reads it (to compute mastery) and accepts marker updates forwarded from
//! that collaborator.

use crate::error::CoreError;
use dashmap::DashMap;
use practix_types::{ItemId, ProgressMarker, UserId};
use std::collections::HashMap;

/// Source of the latest progress marker per (user, item)
pub trait ProgressSource: Send + Sync + 'static {
    /// Latest marker for every item the user has touched
    fn latest_markers(&self, user: &UserId) -> Result<Vec<ProgressMarker>, CoreError>;

    /// Store a marker; older markers for the same item are superseded
    fn record(&self, marker: ProgressMarker) -> Result<(), CoreError>;
}

/// In-memory progress source
#[derive(Default)]
pub struct InMemoryProgress {
    markers: DashMap<UserId, HashMap<ItemId, ProgressMarker>>,
}

impl InMemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.markers.len()
    }
}

impl ProgressSource for InMemoryProgress {
    fn latest_markers(&self, user: &UserId) -> Result<Vec<ProgressMarker>, CoreError> {
        Ok(self
            .markers
            .get(user)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default())
    }

    fn record(&self, marker: ProgressMarker) -> Result<(), CoreError> {
        let mut items = self.markers.entry(marker.user_id.clone()).or_default();
        match items.get(&marker.item_id) {
            // Out-of-order delivery: keep the newest
            Some(existing) if existing.updated_at > marker.updated_at => {}
            _ => {
                items.insert(marker.item_id.clone(), marker);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn marker(item: &str, confidence: u8, minutes_ago: i64) -> ProgressMarker {
        ProgressMarker {
            user_id: "u1".into(),
            item_id: item.into(),
            confidence_level: confidence,
            updated_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_latest_marker_wins() {
        let progress = InMemoryProgress::new();
        progress.record(marker("a", 5, 1)).unwrap();
        progress.record(marker("a", 1, 10)).unwrap();
        progress.record(marker("b", 2, 0)).unwrap();

        let mut markers = progress.latest_markers(&"u1".into()).unwrap();
        markers.sort_by(|x, y| x.item_id.cmp(&y.item_id));
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].confidence_level, 5);
        assert!(markers[0].is_mastered());
        assert!(!markers[1].is_mastered());
    }

    #[test]
    fn test_unknown_user_has_no_markers() {
        let progress = InMemoryProgress::new();
        assert!(progress.latest_markers(&"nobody".into()).unwrap().is_empty());
        assert_eq!(progress.user_count(), 0);
    }
}
