//! Realtime wire message types.
//!
//! Defines the envelopes exchanged with the change feed: one subscribe
//! request per signed-in user, then a stream of change messages scoped to
//! that user's notifications.

use serde::{Deserialize, Serialize};

use crate::notifications::Notification;

/// Client -> server subscription request.
///
/// Identifies the logical channel: a resource class plus the owning user id
/// as the row filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscribeRequest {
    pub action: String,
    pub topic: String,
    pub user_id: usize,
}

impl SubscribeRequest {
    /// Subscribe to the notification change feed of one user.
    pub fn notifications(user_id: usize) -> Self {
        Self {
            action: "subscribe".to_string(),
            topic: "notifications".to_string(),
            user_id,
        }
    }
}

/// Kind of change carried by a [`ChangeMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
}

/// Server -> client change message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeMessage {
    pub event: ChangeKind,
    pub record: Notification,
}

/// Typed event consumed by the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Created(Notification),
    Updated(Notification),
}

impl From<ChangeMessage> for ChangeEvent {
    fn from(message: ChangeMessage) -> Self {
        match message.event {
            ChangeKind::Created => ChangeEvent::Created(message.record),
            ChangeKind::Updated => ChangeEvent::Updated(message.record),
        }
    }
}
