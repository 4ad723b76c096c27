//! User notifications module

mod feed;
mod http_source;
mod models;
mod source;

pub use feed::{EventOutcome, FeedPhase, FeedSnapshot, FetchTicket, NotificationFeed};
pub use http_source::HttpNotificationApi;
pub use models::Notification;
pub use source::NotificationApi;

#[cfg(feature = "mock")]
pub use source::MockNotificationApi;
