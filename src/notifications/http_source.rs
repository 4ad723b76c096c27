//! HTTP client for the notification endpoints of the Nestmate data API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::models::Notification;
use super::source::NotificationApi;

/// [`NotificationApi`] over the remote data API.
pub struct HttpNotificationApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct UnreadCountResponse {
    count: usize,
}

impl HttpNotificationApi {
    /// Create a new API client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the data API (e.g., "http://localhost:3000")
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(base_url: String, timeout_sec: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_page(
        &self,
        user_id: usize,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Notification>> {
        let url = format!("{}/users/{}/notifications", self.base_url, user_id);
        let response = self
            .client
            .get(&url)
            .query(&[("page", page), ("page_size", page_size)])
            .send()
            .await
            .context("Failed to fetch notifications page")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to fetch notifications page {}: status {}",
                page,
                response.status()
            );
        }

        response
            .json()
            .await
            .context("Failed to parse notifications page")
    }

    async fn unread_count(&self, user_id: usize) -> Result<usize> {
        let url = format!(
            "{}/users/{}/notifications/unread-count",
            self.base_url, user_id
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch unread count")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch unread count: status {}", response.status());
        }

        let body: UnreadCountResponse = response
            .json()
            .await
            .context("Failed to parse unread count response")?;
        Ok(body.count)
    }

    async fn mark_read(&self, user_id: usize, notification_id: &str) -> Result<()> {
        let url = format!(
            "{}/users/{}/notifications/{}/read",
            self.base_url, user_id, notification_id
        );
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .context("Failed to confirm mark-read")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to mark notification {} read: status {}",
                notification_id,
                response.status()
            );
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: usize) -> Result<()> {
        let url = format!("{}/users/{}/notifications/read-all", self.base_url, user_id);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .context("Failed to confirm mark-all-read")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to mark all read: status {}", response.status());
        }
        Ok(())
    }
}
