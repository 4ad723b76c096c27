//! Client configuration, loaded from a TOML file.
//!
//! Subsystem sections are optional: a missing `[cache]` section disables
//! caching entirely (the app runs correct but uncached), a missing
//! `[realtime]` section disables the push subscription (manual refresh only).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiSettings,
    pub notifications: NotificationSettings,
    pub cache: Option<CacheSettings>,
    pub realtime: Option<RealtimeSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the Nestmate data API.
    pub base_url: String,
    pub timeout_sec: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_sec: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Page size for notification fetches.
    pub page_size: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `host:port` of the key/value backend.
    pub url: String,
    pub password: Option<String>,
    /// TTL applied by readers that don't pick their own.
    pub default_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:6379".to_string(),
            password: None,
            default_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// Websocket URL of the change feed.
    pub url: String,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000/realtime".to_string(),
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
