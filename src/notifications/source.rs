//! Authoritative notification source trait

use anyhow::Result;
use async_trait::async_trait;

use super::models::Notification;

/// Seam to the remote relational source of truth for notifications.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Fetch one fixed-size page for a user, ordered by `created_at` DESC.
    /// `page` is zero-based.
    async fn fetch_page(
        &self,
        user_id: usize,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Notification>>;

    /// Authoritative unread count for a user (a count query on the source,
    /// not a scan of locally-loaded records).
    async fn unread_count(&self, user_id: usize) -> Result<usize>;

    /// Confirm a single notification as read.
    async fn mark_read(&self, user_id: usize, notification_id: &str) -> Result<()>;

    /// Confirm all of a user's notifications as read.
    async fn mark_all_read(&self, user_id: usize) -> Result<()>;
}
