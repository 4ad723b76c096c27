//! Nestmate Client Data Runtime
//!
//! The client-side data layer of the Nestmate property-matching app: a
//! fail-open cache-aside reader over a remote key/value store, a realtime
//! notification feed reconciled against the paginated source of truth, and
//! locally persisted alert preferences.

pub mod cache;
pub mod center;
pub mod config;
pub mod notifications;
pub mod prefs;
pub mod realtime;

// Re-export commonly used types for convenience
pub use cache::{CacheClient, CacheStore, MemoryCacheStore, RedisCacheStore};
pub use center::{AlertEffect, NotificationCenter};
pub use config::ClientConfig;
pub use notifications::{
    FeedPhase, FeedSnapshot, HttpNotificationApi, Notification, NotificationApi, NotificationFeed,
};
pub use prefs::{AlertPrefs, FilePrefsStorage, PreferenceStore, PrefsUpdate};
pub use realtime::{ChangeEvent, RealtimeSubscription, SubscriptionOptions};
