//! Local notification feed state machine.
//!
//! Pure state, no I/O: the async orchestration lives in
//! [`crate::center::NotificationCenter`]. Fetches are two-phase: a `begin_*`
//! call returns a [`FetchTicket`] carrying the feed generation, and the
//! matching `complete_*` / [`NotificationFeed::fail_fetch`] settles it. A
//! reset (any new first-page fetch) bumps the generation, so an older
//! in-flight fetch settles as a silent discard rather than clobbering newer
//! state.
//!
//! The unread counter is seeded from the source's authoritative count on
//! every first-page load and adjusted incrementally afterwards; it is never
//! recomputed by scanning the local collection.

use tracing::debug;

use super::models::Notification;
use crate::realtime::ChangeEvent;

/// Feed lifecycle phase. `Ready` is re-entered after every fetch settles,
/// success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Uninitialized,
    LoadingFirstPage,
    Ready,
    LoadingMore,
}

/// Handle for one in-flight page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    page: usize,
}

impl FetchTicket {
    /// Zero-based page index this ticket's fetch should request.
    pub fn page(&self) -> usize {
        self.page
    }
}

/// What applying a realtime event did to local state.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// A genuinely new record was inserted; alert side effects may fire.
    Inserted(Notification),
    /// An existing record was updated in place.
    Applied,
    /// Duplicate delivery (create for an id already present); nothing changed.
    Ignored,
    /// Update for an id never seen locally. Update-before-create is a
    /// transport bug upstream, not something this layer repairs.
    Unknown,
}

/// Read-only view of the feed for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub records: Vec<Notification>,
    pub unread: usize,
    pub phase: FeedPhase,
    pub has_more: bool,
}

/// Paginated, deduplicated, time-ordered notification collection for one
/// user, with an incrementally-maintained unread counter.
pub struct NotificationFeed {
    page_size: usize,
    records: Vec<Notification>,
    unread: usize,
    phase: FeedPhase,
    has_more: bool,
    generation: u64,
    next_page: usize,
}

impl NotificationFeed {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            records: Vec::new(),
            unread: 0,
            phase: FeedPhase::Uninitialized,
            has_more: false,
            generation: 0,
            next_page: 0,
        }
    }

    pub fn records(&self) -> &[Notification] {
        &self.records
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            records: self.records.clone(),
            unread: self.unread,
            phase: self.phase,
            has_more: self.has_more,
        }
    }

    /// Start a first-page fetch (initial load or refresh).
    ///
    /// Bumps the generation: any fetch still in flight from before this call
    /// will be discarded when it settles.
    pub fn begin_first_page(&mut self) -> FetchTicket {
        self.generation += 1;
        self.phase = FeedPhase::LoadingFirstPage;
        FetchTicket {
            generation: self.generation,
            page: 0,
        }
    }

    /// Start fetching the next page. Only valid when the feed is `Ready` and
    /// believes there is more; returns `None` otherwise.
    pub fn begin_next_page(&mut self) -> Option<FetchTicket> {
        if self.phase != FeedPhase::Ready || !self.has_more {
            return None;
        }
        self.phase = FeedPhase::LoadingMore;
        Some(FetchTicket {
            generation: self.generation,
            page: self.next_page,
        })
    }

    /// Apply a settled first-page fetch: replace local state wholesale and
    /// seed the unread counter from the authoritative count query.
    ///
    /// Returns false when the ticket is stale (a newer fetch superseded it);
    /// the batch is discarded and the newer fetch keeps ownership of the
    /// phase.
    pub fn complete_first_page(
        &mut self,
        ticket: FetchTicket,
        batch: Vec<Notification>,
        authoritative_unread: usize,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!("Discarding stale first-page fetch result");
            return false;
        }
        self.has_more = batch.len() == self.page_size;
        self.records = batch;
        self.records
            .sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        self.unread = authoritative_unread;
        self.next_page = 1;
        self.phase = FeedPhase::Ready;
        true
    }

    /// Apply a settled next-page fetch: dedup-by-id merge into the existing
    /// collection, preserving descending `created_at` order.
    ///
    /// `has_more` is a heuristic: an exact-page-size batch is read as "there
    /// may be more". When the source holds exactly one more full page this
    /// over-reports by one page and the extra fetch comes back empty.
    ///
    /// The unread counter is not adjusted here: merged records were already
    /// included in the authoritative count (or in increments since).
    pub fn complete_next_page(&mut self, ticket: FetchTicket, batch: Vec<Notification>) -> bool {
        if ticket.generation != self.generation {
            debug!("Discarding stale next-page fetch result");
            return false;
        }
        self.has_more = batch.len() == self.page_size;
        for notification in batch {
            if !self.contains(&notification.id) {
                self.insert_sorted(notification);
            }
        }
        self.next_page += 1;
        self.phase = FeedPhase::Ready;
        true
    }

    /// Settle a failed fetch: back to `Ready`, state untouched. Stale tickets
    /// are ignored here too.
    pub fn fail_fetch(&mut self, ticket: FetchTicket) {
        if ticket.generation != self.generation {
            return;
        }
        self.phase = FeedPhase::Ready;
    }

    /// Apply one realtime change event. Non-suspending: callers must invoke
    /// this as a discrete step so the counter transition math never races a
    /// neighbouring event.
    pub fn apply_event(&mut self, event: ChangeEvent) -> EventOutcome {
        match event {
            ChangeEvent::Created(notification) => {
                if self.contains(&notification.id) {
                    // Already delivered via page fetch or an earlier push
                    // (e.g. a reconnect replay).
                    return EventOutcome::Ignored;
                }
                if !notification.is_read {
                    self.unread += 1;
                }
                self.insert_sorted(notification.clone());
                EventOutcome::Inserted(notification)
            }
            ChangeEvent::Updated(notification) => {
                let Some(existing) = self
                    .records
                    .iter_mut()
                    .find(|record| record.id == notification.id)
                else {
                    return EventOutcome::Unknown;
                };
                // Adjust the counter only on an actual read-state transition
                // so redelivery of the same update is a no-op.
                if existing.is_read != notification.is_read {
                    if notification.is_read {
                        self.unread = self.unread.saturating_sub(1);
                    } else {
                        self.unread += 1;
                    }
                }
                *existing = notification;
                EventOutcome::Applied
            }
        }
    }

    /// Optimistic local mark-read. Returns true when the record existed and
    /// was unread (i.e. anything changed).
    pub fn mark_read(&mut self, notification_id: &str) -> bool {
        let Some(record) = self
            .records
            .iter_mut()
            .find(|record| record.id == notification_id)
        else {
            return false;
        };
        if record.is_read {
            return false;
        }
        record.is_read = true;
        self.unread = self.unread.saturating_sub(1);
        true
    }

    /// Optimistic local mark-all-read. Sets the counter straight to zero and
    /// returns how many records flipped.
    pub fn mark_all_read(&mut self) -> usize {
        let mut flipped = 0;
        for record in &mut self.records {
            if !record.is_read {
                record.is_read = true;
                flipped += 1;
            }
        }
        self.unread = 0;
        flipped
    }

    /// Drop all local state (e.g. on sign-out). In-flight fetches settle as
    /// discards.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.records.clear();
        self.unread = 0;
        self.has_more = false;
        self.next_page = 0;
        self.phase = FeedPhase::Uninitialized;
    }

    fn contains(&self, notification_id: &str) -> bool {
        self.records
            .iter()
            .any(|record| record.id == notification_id)
    }

    fn insert_sorted(&mut self, notification: Notification) {
        let position = self
            .records
            .binary_search_by(|probe| probe.sort_key().cmp(&notification.sort_key()).reverse())
            .unwrap_or_else(|position| position);
        self.records.insert(position, notification);
    }
}
