//! Common test infrastructure
//!
//! Scripted in-memory doubles for the external collaborators: the relational
//! notification source and the realtime wire (a plain channel). Tests drive
//! the real feed/center/cache code against these.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;

use nestmate_client::notifications::{Notification, NotificationApi};

/// Test user everything is scoped to.
pub const TEST_USER_ID: usize = 7;

/// Opt-in crate logs for a test run (`RUST_LOG=nestmate_client=debug`).
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Build a notification owned by the test user.
pub fn notification(id: &str, created_at: i64, is_read: bool) -> Notification {
    Notification {
        id: id.to_string(),
        user_id: TEST_USER_ID,
        title: format!("Notification {}", id),
        body: None,
        data: serde_json::Value::Null,
        is_read,
        created_at,
    }
}

/// Scripted stand-in for the remote relational source.
///
/// Holds the "server-side" collection; pages are cut from it on demand, the
/// unread count is a real count over it, and confirmed writes mutate it, so
/// a refresh after a write observes exactly what a real source would return.
pub struct ScriptedApi {
    records: Mutex<Vec<Notification>>,
    fail_writes: AtomicBool,
    /// When set, `mark_all_read` blocks until the gate is released. Lets a
    /// test interleave realtime traffic with an in-flight confirmation.
    mark_all_gate: Mutex<Option<Arc<Notify>>>,
    pub mark_read_calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new(mut records: Vec<Notification>) -> Self {
        records.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Self {
            records: Mutex::new(records),
            fail_writes: AtomicBool::new(false),
            mark_all_gate: Mutex::new(None),
            mark_read_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Install a gate; `mark_all_read` will park on it until
    /// `gate.notify_one()` is called.
    pub fn gate_mark_all(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.mark_all_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Add a record server-side (e.g. the row backing a realtime push).
    pub fn insert(&self, record: Notification) {
        let mut records = self.records.lock().unwrap();
        records.push(record);
        records.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
    }

    pub fn server_unread(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|n| !n.is_read)
            .count()
    }
}

#[async_trait]
impl NotificationApi for ScriptedApi {
    async fn fetch_page(
        &self,
        _user_id: usize,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Notification>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .skip(page * page_size)
            .take(page_size)
            .cloned()
            .collect())
    }

    async fn unread_count(&self, _user_id: usize) -> Result<usize> {
        Ok(self.server_unread())
    }

    async fn mark_read(&self, _user_id: usize, notification_id: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("write rejected");
        }
        self.mark_read_calls
            .lock()
            .unwrap()
            .push(notification_id.to_string());
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|n| n.id == notification_id) {
            record.is_read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self, _user_id: usize) -> Result<()> {
        let gate = self.mark_all_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("write rejected");
        }
        for record in self.records.lock().unwrap().iter_mut() {
            record.is_read = true;
        }
        Ok(())
    }
}
