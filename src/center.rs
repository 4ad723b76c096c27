//! Notification center: async orchestration over the feed.
//!
//! Owns the feed state, the source API, the alert preferences and (when
//! realtime is configured) the change-feed subscription. The feed mutex is
//! only ever held for synchronous state transitions, never across an await,
//! so realtime events, page fetches and optimistic writes serialize cleanly.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::notifications::{
    EventOutcome, FeedSnapshot, Notification, NotificationApi, NotificationFeed,
};
use crate::prefs::PreferenceStore;
use crate::realtime::{ChangeEvent, RealtimeSubscription};

/// UI side effect requested for an incoming notification.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEffect {
    PlaySound,
    ShowToast(Notification),
}

struct Consumer {
    task: JoinHandle<()>,
    // Held only for ownership: dropping it tears the websocket pump down.
    _subscription: Option<RealtimeSubscription>,
}

/// One signed-in user's notification session.
pub struct NotificationCenter {
    user_id: usize,
    page_size: usize,
    api: Arc<dyn NotificationApi>,
    prefs: Arc<PreferenceStore>,
    feed: Arc<Mutex<NotificationFeed>>,
    effects: mpsc::Sender<AlertEffect>,
    consumer: std::sync::Mutex<Option<Consumer>>,
}

impl NotificationCenter {
    /// Create a center for `user_id`. Returns the center plus the effect
    /// stream the UI should drain (sounds, toasts).
    pub fn new(
        user_id: usize,
        page_size: usize,
        api: Arc<dyn NotificationApi>,
        prefs: Arc<PreferenceStore>,
    ) -> (Self, mpsc::Receiver<AlertEffect>) {
        let (effects_tx, effects_rx) = mpsc::channel(64);
        let center = Self {
            user_id,
            page_size,
            api,
            prefs,
            feed: Arc::new(Mutex::new(NotificationFeed::new(page_size))),
            effects: effects_tx,
            consumer: std::sync::Mutex::new(None),
        };
        (center, effects_rx)
    }

    pub fn user_id(&self) -> usize {
        self.user_id
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        self.feed.lock().await.snapshot()
    }

    /// Load (or reload) the first page and the authoritative unread count,
    /// replacing local state wholesale. Any fetch still in flight is
    /// discarded when it settles.
    pub async fn refresh(&self) -> Result<()> {
        let ticket = { self.feed.lock().await.begin_first_page() };

        let (fetched, counted) = tokio::join!(
            self.api.fetch_page(self.user_id, ticket.page(), self.page_size),
            self.api.unread_count(self.user_id),
        );

        let mut feed = self.feed.lock().await;
        match (fetched, counted) {
            (Ok(batch), Ok(unread)) => {
                feed.complete_first_page(ticket, batch, unread);
                Ok(())
            }
            (Err(err), _) | (_, Err(err)) => {
                feed.fail_fetch(ticket);
                Err(err)
            }
        }
    }

    /// Fetch the next page, if the feed is ready and believes there is one.
    /// Returns whether a fetch actually ran.
    pub async fn load_more(&self) -> Result<bool> {
        let Some(ticket) = ({ self.feed.lock().await.begin_next_page() }) else {
            return Ok(false);
        };

        match self
            .api
            .fetch_page(self.user_id, ticket.page(), self.page_size)
            .await
        {
            Ok(batch) => {
                self.feed.lock().await.complete_next_page(ticket, batch);
                Ok(true)
            }
            Err(err) => {
                self.feed.lock().await.fail_fetch(ticket);
                Err(err)
            }
        }
    }

    /// Mark one notification read: optimistic local flip, then the
    /// confirming write. On confirmation failure local state is re-derived
    /// from the source with a full refresh (interleaved realtime changes
    /// make a hand-rolled undo unsafe) and the error is still returned.
    pub async fn mark_read(&self, notification_id: &str) -> Result<()> {
        {
            // The record may live on a page that was never loaded; the
            // confirming write is issued either way.
            self.feed.lock().await.mark_read(notification_id);
        }

        match self.api.mark_read(self.user_id, notification_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("Mark-read confirmation failed, resyncing: {:#}", err);
                if let Err(refresh_err) = self.refresh().await {
                    warn!("Resync after failed mark-read failed too: {:#}", refresh_err);
                }
                Err(err)
            }
        }
    }

    /// Mark everything read: the counter drops to zero optimistically, then
    /// the confirming write runs, with the same resync-on-failure contract as
    /// [`Self::mark_read`].
    pub async fn mark_all_read(&self) -> Result<()> {
        {
            self.feed.lock().await.mark_all_read();
        }

        match self.api.mark_all_read(self.user_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("Mark-all-read confirmation failed, resyncing: {:#}", err);
                if let Err(refresh_err) = self.refresh().await {
                    warn!(
                        "Resync after failed mark-all-read failed too: {:#}",
                        refresh_err
                    );
                }
                Err(err)
            }
        }
    }

    /// Consume realtime events from an already-open subscription. The center
    /// owns the subscription from here on and tears it down on detach/drop.
    pub fn attach_subscription(
        &self,
        subscription: RealtimeSubscription,
        events: mpsc::Receiver<ChangeEvent>,
    ) {
        self.attach(events, Some(subscription));
    }

    /// Consume realtime events from a bare channel (no owned subscription).
    pub fn attach_events(&self, events: mpsc::Receiver<ChangeEvent>) {
        self.attach(events, None);
    }

    fn attach(&self, mut events: mpsc::Receiver<ChangeEvent>, subscription: Option<RealtimeSubscription>) {
        let feed = Arc::clone(&self.feed);
        let prefs = Arc::clone(&self.prefs);
        let effects = self.effects.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                // One discrete, non-suspending application per event keeps
                // the counter's transition math race-free.
                let outcome = { feed.lock().await.apply_event(event) };
                match outcome {
                    EventOutcome::Inserted(record) if !record.is_read => {
                        // Alerts fire only for genuinely new records; replays
                        // and page-fetch duplicates never reach this arm.
                        let current = prefs.current();
                        if current.sound_enabled {
                            if let Err(err) = effects.try_send(AlertEffect::PlaySound) {
                                debug!("Dropping sound alert: {}", err);
                            }
                        }
                        if current.toast_enabled {
                            if let Err(err) = effects.try_send(AlertEffect::ShowToast(record)) {
                                debug!("Dropping toast alert: {}", err);
                            }
                        }
                    }
                    EventOutcome::Unknown => {
                        warn!("Update event for a notification never seen locally");
                    }
                    _ => {}
                }
            }
        });

        let mut guard = self.consumer.lock().unwrap();
        if let Some(previous) = guard.replace(Consumer {
            task,
            _subscription: subscription,
        }) {
            previous.task.abort();
        }
    }

    /// Stop consuming realtime events and tear down the owned subscription.
    pub fn detach(&self) {
        if let Some(previous) = self.consumer.lock().unwrap().take() {
            previous.task.abort();
        }
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::FeedPhase;
    use crate::prefs::{MemoryPrefsStorage, PrefsUpdate};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::time::{sleep, Duration};

    fn notification(id: &str, created_at: i64, is_read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            user_id: 7,
            title: format!("Notification {}", id),
            body: None,
            data: serde_json::Value::Null,
            is_read,
            created_at,
        }
    }

    /// Scripted source: pages indexed by number, settable unread count,
    /// switchable write failures.
    #[derive(Default)]
    struct FakeApi {
        pages: StdMutex<Vec<Vec<Notification>>>,
        unread: StdMutex<usize>,
        fail_writes: AtomicBool,
        mark_read_calls: StdMutex<Vec<String>>,
        mark_all_calls: StdMutex<usize>,
    }

    impl FakeApi {
        fn set_state(&self, pages: Vec<Vec<Notification>>, unread: usize) {
            *self.pages.lock().unwrap() = pages;
            *self.unread.lock().unwrap() = unread;
        }
    }

    #[async_trait]
    impl NotificationApi for FakeApi {
        async fn fetch_page(
            &self,
            _user_id: usize,
            page: usize,
            _page_size: usize,
        ) -> Result<Vec<Notification>> {
            Ok(self
                .pages
                .lock()
                .unwrap()
                .get(page)
                .cloned()
                .unwrap_or_default())
        }

        async fn unread_count(&self, _user_id: usize) -> Result<usize> {
            Ok(*self.unread.lock().unwrap())
        }

        async fn mark_read(&self, _user_id: usize, notification_id: &str) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                anyhow::bail!("write rejected");
            }
            self.mark_read_calls
                .lock()
                .unwrap()
                .push(notification_id.to_string());
            Ok(())
        }

        async fn mark_all_read(&self, _user_id: usize) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                anyhow::bail!("write rejected");
            }
            *self.mark_all_calls.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn center_with(api: Arc<FakeApi>) -> (NotificationCenter, mpsc::Receiver<AlertEffect>) {
        let prefs = Arc::new(PreferenceStore::load(Arc::new(MemoryPrefsStorage::new())));
        NotificationCenter::new(7, 2, api, prefs)
    }

    #[tokio::test]
    async fn refresh_populates_feed_from_source() {
        let api = Arc::new(FakeApi::default());
        api.set_state(
            vec![vec![
                notification("b", 200, false),
                notification("a", 100, true),
            ]],
            1,
        );
        let (center, _effects) = center_with(api);

        center.refresh().await.unwrap();

        let snapshot = center.snapshot().await;
        assert_eq!(snapshot.phase, FeedPhase::Ready);
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.unread, 1);
        assert!(snapshot.has_more);
    }

    #[tokio::test]
    async fn refresh_failure_settles_back_to_ready() {
        struct FailingApi;
        #[async_trait]
        impl NotificationApi for FailingApi {
            async fn fetch_page(&self, _: usize, _: usize, _: usize) -> Result<Vec<Notification>> {
                anyhow::bail!("source down")
            }
            async fn unread_count(&self, _: usize) -> Result<usize> {
                anyhow::bail!("source down")
            }
            async fn mark_read(&self, _: usize, _: &str) -> Result<()> {
                Ok(())
            }
            async fn mark_all_read(&self, _: usize) -> Result<()> {
                Ok(())
            }
        }

        let prefs = Arc::new(PreferenceStore::load(Arc::new(MemoryPrefsStorage::new())));
        let (center, _effects) = NotificationCenter::new(7, 2, Arc::new(FailingApi), prefs);

        assert!(center.refresh().await.is_err());
        assert_eq!(center.snapshot().await.phase, FeedPhase::Ready);
    }

    #[tokio::test]
    async fn load_more_appends_next_page() {
        let api = Arc::new(FakeApi::default());
        api.set_state(
            vec![
                vec![notification("d", 400, true), notification("c", 300, true)],
                vec![notification("b", 200, true), notification("a", 100, true)],
            ],
            0,
        );
        let (center, _effects) = center_with(api);

        center.refresh().await.unwrap();
        assert!(center.load_more().await.unwrap());

        let snapshot = center.snapshot().await;
        let ids: Vec<&str> = snapshot.records.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c", "b", "a"]);
    }

    #[tokio::test]
    async fn load_more_is_a_noop_before_first_page() {
        let api = Arc::new(FakeApi::default());
        let (center, _effects) = center_with(api);
        assert!(!center.load_more().await.unwrap());
    }

    #[tokio::test]
    async fn mark_read_flips_locally_and_confirms_remotely() {
        let api = Arc::new(FakeApi::default());
        api.set_state(vec![vec![notification("a", 100, false)]], 1);
        let (center, _effects) = center_with(api.clone());

        center.refresh().await.unwrap();
        center.mark_read("a").await.unwrap();

        let snapshot = center.snapshot().await;
        assert!(snapshot.records[0].is_read);
        assert_eq!(snapshot.unread, 0);
        assert_eq!(*api.mark_read_calls.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn failed_mark_read_resyncs_from_source() {
        let api = Arc::new(FakeApi::default());
        api.set_state(vec![vec![notification("a", 100, false)]], 1);
        let (center, _effects) = center_with(api.clone());
        center.refresh().await.unwrap();

        api.fail_writes.store(true, Ordering::SeqCst);
        assert!(center.mark_read("a").await.is_err());

        // The source never applied the write, so the resynced state shows the
        // record unread again, not the failed optimistic guess.
        let snapshot = center.snapshot().await;
        assert!(!snapshot.records[0].is_read);
        assert_eq!(snapshot.unread, 1);
    }

    #[tokio::test]
    async fn mark_all_read_zeroes_counter_optimistically() {
        let api = Arc::new(FakeApi::default());
        api.set_state(
            vec![vec![
                notification("b", 200, false),
                notification("a", 100, false),
            ]],
            2,
        );
        let (center, _effects) = center_with(api.clone());
        center.refresh().await.unwrap();

        center.mark_all_read().await.unwrap();

        let snapshot = center.snapshot().await;
        assert_eq!(snapshot.unread, 0);
        assert!(snapshot.records.iter().all(|n| n.is_read));
        assert_eq!(*api.mark_all_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn attached_events_flow_into_feed_and_emit_alerts() {
        let api = Arc::new(FakeApi::default());
        api.set_state(vec![vec![]], 0);
        let (center, mut effects) = center_with(api);
        center.refresh().await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        center.attach_events(rx);

        tx.send(ChangeEvent::Created(notification("n1", 500, false)))
            .await
            .unwrap();

        assert_eq!(effects.recv().await.unwrap(), AlertEffect::PlaySound);
        assert_eq!(
            effects.recv().await.unwrap(),
            AlertEffect::ShowToast(notification("n1", 500, false))
        );
        assert_eq!(center.snapshot().await.unread, 1);
    }

    #[tokio::test]
    async fn alerts_respect_preferences() {
        let api = Arc::new(FakeApi::default());
        api.set_state(vec![vec![]], 0);
        let prefs = Arc::new(PreferenceStore::load(Arc::new(MemoryPrefsStorage::new())));
        prefs
            .update(PrefsUpdate {
                sound: Some(false),
                toast: None,
            })
            .unwrap();
        let (center, mut effects) = NotificationCenter::new(7, 2, api, prefs);
        center.refresh().await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        center.attach_events(rx);

        tx.send(ChangeEvent::Created(notification("n1", 500, false)))
            .await
            .unwrap();

        // Sound is off: the toast is the first and only effect.
        assert_eq!(
            effects.recv().await.unwrap(),
            AlertEffect::ShowToast(notification("n1", 500, false))
        );
    }

    #[tokio::test]
    async fn duplicate_deliveries_alert_only_once() {
        let api = Arc::new(FakeApi::default());
        api.set_state(vec![vec![]], 0);
        let (center, mut effects) = center_with(api);
        center.refresh().await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        center.attach_events(rx);

        let event = ChangeEvent::Created(notification("n1", 500, false));
        tx.send(event.clone()).await.unwrap();
        tx.send(event).await.unwrap();
        // A later, distinct record proves the duplicate produced nothing.
        tx.send(ChangeEvent::Created(notification("n2", 600, false)))
            .await
            .unwrap();

        assert_eq!(effects.recv().await.unwrap(), AlertEffect::PlaySound);
        assert_eq!(
            effects.recv().await.unwrap(),
            AlertEffect::ShowToast(notification("n1", 500, false))
        );
        assert_eq!(effects.recv().await.unwrap(), AlertEffect::PlaySound);
        assert_eq!(
            effects.recv().await.unwrap(),
            AlertEffect::ShowToast(notification("n2", 600, false))
        );
        assert_eq!(center.snapshot().await.unread, 2);
    }

    #[tokio::test]
    async fn already_read_pushes_do_not_alert() {
        let api = Arc::new(FakeApi::default());
        api.set_state(vec![vec![]], 0);
        let (center, mut effects) = center_with(api);
        center.refresh().await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        center.attach_events(rx);

        tx.send(ChangeEvent::Created(notification("n1", 500, true)))
            .await
            .unwrap();
        tx.send(ChangeEvent::Created(notification("n2", 600, false)))
            .await
            .unwrap();

        // Only the unread record alerts.
        assert_eq!(effects.recv().await.unwrap(), AlertEffect::PlaySound);
        assert_eq!(
            effects.recv().await.unwrap(),
            AlertEffect::ShowToast(notification("n2", 600, false))
        );
    }

    #[tokio::test]
    async fn detach_stops_the_consumer() {
        let api = Arc::new(FakeApi::default());
        let (center, _effects) = center_with(api);

        let (tx, rx) = mpsc::channel(8);
        center.attach_events(rx);
        center.detach();

        // The aborted consumer drops its receiver; the channel closes.
        for _ in 0..100 {
            if tx.is_closed() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("consumer kept the event channel open after detach");
    }
}
