//! Notification data models

use serde::{Deserialize, Serialize};

/// A user notification as delivered by the data API and the realtime feed.
///
/// `id` is server-assigned and unique within one user's collection. `data`
/// carries the feature-specific payload (listing id, match score, ...) and is
/// opaque to this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: usize,
    pub title: String,
    pub body: Option<String>,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: i64,
}

impl Notification {
    /// Ordering key for the feed: newest first, ties broken by `id` so the
    /// materialized order is total and independent of arrival path.
    pub(crate) fn sort_key(&self) -> (i64, &str) {
        (self.created_at, self.id.as_str())
    }
}
