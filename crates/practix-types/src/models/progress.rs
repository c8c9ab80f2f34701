//! Per-user progress markers (owned by the user-tracking collaborator)

use super::item::{string_id, ItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_id!(
    /// Identifier of an end user
    UserId
);

/// Latest confidence a user reported for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMarker {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// 0 (unseen) to 5 (fully confident)
    pub confidence_level: u8,
    pub updated_at: DateTime<Utc>,
}

impl ProgressMarker {
    /// Confidence level at which an item counts as mastered
    pub const MASTERY_THRESHOLD: u8 = 4;

    pub fn is_mastered(&self) -> bool {
        self.confidence_level >= Self::MASTERY_THRESHOLD
    }
}
