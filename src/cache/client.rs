//! Fail-open cache client with cache-aside reads and pattern invalidation.
//!
//! Every failure mode here degrades performance, never correctness: a broken
//! or unconfigured cache backend turns every read into a direct source fetch.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::remote::RedisCacheStore;
use super::store::CacheStore;
use crate::config::CacheSettings;

/// Client wrapper over a [`CacheStore`].
///
/// Holds a one-time reachability probe result: the first operation issues a
/// `PING`; an unreachable backend is logged once and every later operation
/// silently no-ops. The client is an explicit, injected object so independent
/// clients (and tests) get independent probe state.
pub struct CacheClient {
    store: Option<Arc<dyn CacheStore>>,
    reachable: Mutex<Option<bool>>,
}

impl CacheClient {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store: Some(store),
            reachable: Mutex::new(None),
        }
    }

    /// A client with no backend: every operation no-ops, reads always miss.
    pub fn disabled() -> Self {
        Self {
            store: None,
            reachable: Mutex::new(None),
        }
    }

    /// Build from config. A missing `[cache]` section means caching is off.
    pub fn from_settings(settings: Option<&CacheSettings>) -> Self {
        match settings {
            Some(settings) => Self::new(Arc::new(RedisCacheStore::new(
                settings.url.clone(),
                settings.password.clone(),
            ))),
            None => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Probe the backend on first use; cached for the life of the client.
    async fn available(&self) -> Option<&Arc<dyn CacheStore>> {
        let store = self.store.as_ref()?;
        let mut reachable = self.reachable.lock().await;
        let ok = match *reachable {
            Some(ok) => ok,
            None => {
                let ok = match store.ping().await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!("Cache backend unreachable, running uncached: {}", err);
                        false
                    }
                };
                *reachable = Some(ok);
                ok
            }
        };
        ok.then_some(store)
    }

    /// Fail-open read: any failure is reported as a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        let store = self.available().await?;
        match store.get(key).await {
            Ok(value) => value,
            Err(err) => {
                debug!("Cache read failed for {}: {}", key, err);
                None
            }
        }
    }

    /// Best-effort write; failures are logged and swallowed.
    pub async fn put(&self, key: &str, value: &str, ttl_secs: u64) {
        let Some(store) = self.available().await else {
            return;
        };
        if let Err(err) = store.set(key, value, ttl_secs).await {
            debug!("Cache write failed for {}: {}", key, err);
        }
    }

    /// Delete every key matching a glob pattern. Returns how many were
    /// removed; best effort, never errors.
    pub async fn delete_matching(&self, pattern: &str) -> u64 {
        let Some(store) = self.available().await else {
            return 0;
        };
        let keys = match store.keys(pattern).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!("Cache key scan failed for {}: {}", pattern, err);
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }
        match store.del(&keys).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!("Cache invalidation failed for {}: {}", pattern, err);
                0
            }
        }
    }

    /// Invalidate every key family touched by a write. Called by writers
    /// after the mutation commits; staleness on failure is bounded by TTL.
    pub async fn invalidate(&self, patterns: &[String]) -> u64 {
        let mut removed = 0;
        for pattern in patterns {
            removed += self.delete_matching(pattern).await;
        }
        removed
    }

    /// Cache-aside read: return the cached value if present, otherwise await
    /// `compute`, store a `Some` result best-effort, and return it.
    ///
    /// Compute errors propagate and leave the cache untouched. A concurrent
    /// writer's invalidation can land between compute and store; the stale
    /// repopulation window is accepted and bounded by `ttl_secs`.
    pub async fn cached_fetch<T, F, Fut>(
        &self,
        key: &str,
        ttl_secs: u64,
        compute: F,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        if let Some(raw) = self.get(key).await {
            match serde_json::from_str(&raw) {
                Ok(value) => return Ok(Some(value)),
                // A decode failure is treated as a miss so a schema change
                // can never wedge a key until its TTL runs out.
                Err(err) => debug!("Discarding undecodable cache entry {}: {}", key, err),
            }
        }

        let computed = compute().await?;
        if let Some(value) = &computed {
            match serde_json::to_string(value) {
                Ok(encoded) => self.put(key, &encoded, ttl_secs).await,
                Err(err) => debug!("Failed to encode value for cache key {}: {}", key, err),
            }
        }
        Ok(computed)
    }
}
