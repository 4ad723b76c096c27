//! Remote cache store speaking the RESP text protocol.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::resp::{RespConnection, RespValue};
use super::store::{CacheError, CacheStore};

/// [`CacheStore`] backed by a remote Redis-compatible server.
///
/// Holds one lazily-established connection behind an async mutex. An I/O
/// error drops the connection so the next operation reconnects from scratch.
pub struct RedisCacheStore {
    addr: String,
    password: Option<String>,
    conn: Mutex<Option<RespConnection>>,
}

impl RedisCacheStore {
    /// Create a store for the server at `addr` (`host:port`).
    ///
    /// When `password` is set, `AUTH` is sent right after each (re)connect.
    pub fn new(addr: impl Into<String>, password: Option<String>) -> Self {
        Self {
            addr: addr.into(),
            password,
            conn: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Run one command against the shared connection, reconnecting if needed.
    async fn run(&self, parts: &[&str]) -> Result<RespValue, CacheError> {
        let mut guard = self.conn.lock().await;

        if guard.is_none() {
            debug!("Connecting to cache backend at {}", self.addr);
            let mut conn = RespConnection::connect(&self.addr).await?;
            if let Some(password) = &self.password {
                conn.command(&["AUTH", password]).await?;
            }
            *guard = Some(conn);
        }

        let conn = guard.as_mut().expect("connection established above");
        match conn.command(parts).await {
            Ok(value) => Ok(value),
            Err(err) => {
                // Any failure may leave the stream mid-frame; reconnect next time.
                *guard = None;
                Err(err)
            }
        }
    }
}

fn unexpected(command: &str, value: RespValue) -> CacheError {
    CacheError::Protocol(format!("unexpected reply to {}: {:?}", command, value))
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.run(&["GET", key]).await? {
            RespValue::Bulk(value) => Ok(value),
            other => Err(unexpected("GET", other)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let ttl = ttl_secs.to_string();
        match self.run(&["SET", key, value, "EX", &ttl]).await? {
            RespValue::Simple(_) => Ok(()),
            other => Err(unexpected("SET", other)),
        }
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut parts = vec!["DEL"];
        parts.extend(keys.iter().map(String::as_str));
        match self.run(&parts).await? {
            RespValue::Integer(n) => Ok(n.max(0) as u64),
            other => Err(unexpected("DEL", other)),
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        match self.run(&["KEYS", pattern]).await? {
            RespValue::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::Bulk(Some(key)) => Ok(key),
                    other => Err(unexpected("KEYS", other)),
                })
                .collect(),
            other => Err(unexpected("KEYS", other)),
        }
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut parts = vec!["MGET"];
        parts.extend(keys.iter().map(String::as_str));
        match self.run(&parts).await? {
            RespValue::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::Bulk(value) => Ok(value),
                    other => Err(unexpected("MGET", other)),
                })
                .collect(),
            other => Err(unexpected("MGET", other)),
        }
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        match self.run(&["INCR", key]).await? {
            RespValue::Integer(n) => Ok(n),
            other => Err(unexpected("INCR", other)),
        }
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, CacheError> {
        let ttl = ttl_secs.to_string();
        match self.run(&["EXPIRE", key, &ttl]).await? {
            RespValue::Integer(n) => Ok(n == 1),
            other => Err(unexpected("EXPIRE", other)),
        }
    }

    async fn ping(&self) -> Result<(), CacheError> {
        match self.run(&["PING"]).await? {
            RespValue::Simple(_) | RespValue::Bulk(Some(_)) => Ok(()),
            other => Err(unexpected("PING", other)),
        }
    }
}
