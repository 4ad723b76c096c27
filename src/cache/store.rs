//! Cache storage trait and error type.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by cache store implementations.
///
/// Callers above `CacheClient` never see these: the client is fail-open and
/// degrades to uncached reads on any error.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend replied with an error (e.g. a RESP `-ERR` line).
    #[error("cache server error: {0}")]
    Server(String),

    /// The backend replied with something the codec could not interpret.
    #[error("cache protocol error: {0}")]
    Protocol(String),
}

/// Key/value cache store operations.
///
/// Mirrors the subset of the wire protocol the client actually uses. All
/// operations are asynchronous; implementations must be safe to share across
/// tasks behind an `Arc`.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` with a time-to-live in seconds.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;

    /// Delete the given keys. Returns how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// List all keys matching a glob pattern (`*` and `?` wildcards).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Get multiple values at once, position-aligned with `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError>;

    /// Increment the integer stored under `key` (missing keys start at 0).
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;

    /// Reset the time-to-live of `key`. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, CacheError>;

    /// Reachability check.
    async fn ping(&self) -> Result<(), CacheError>;
}
