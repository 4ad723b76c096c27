//! Realtime change-feed subscription and wire messages.

mod messages;
mod subscription;

pub use messages::{ChangeEvent, ChangeKind, ChangeMessage, SubscribeRequest};
pub use subscription::{RealtimeSubscription, SubscriptionOptions};
