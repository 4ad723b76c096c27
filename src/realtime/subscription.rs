//! Realtime change-feed subscription.
//!
//! One subscription per signed-in user. The handle owns the websocket pump
//! task outright and aborts it on drop, so a subscription can never outlive
//! the component that holds it, including drops caused by sign-out or a
//! user-identity switch (drop the old handle, open a new one).

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::messages::{ChangeEvent, ChangeMessage, SubscribeRequest};
use crate::config::RealtimeSettings;

/// Reconnect pacing for the pump loop.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionOptions {
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

impl From<&RealtimeSettings> for SubscriptionOptions {
    fn from(settings: &RealtimeSettings) -> Self {
        Self {
            reconnect_initial: Duration::from_millis(settings.reconnect_initial_ms),
            reconnect_max: Duration::from_millis(settings.reconnect_max_ms),
        }
    }
}

/// Handle to one user's live change-feed subscription.
pub struct RealtimeSubscription {
    user_id: usize,
    pump: JoinHandle<()>,
}

impl RealtimeSubscription {
    /// Open a subscription and return the handle plus the event stream.
    ///
    /// The pump task connects, sends the subscribe frame and forwards decoded
    /// events into the channel. On disconnect it retries with capped
    /// exponential backoff and resubscribes; until then pushes simply stop
    /// arriving and a manual refresh remains the fallback.
    pub fn open(
        url: String,
        user_id: usize,
        options: SubscriptionOptions,
    ) -> (Self, mpsc::Receiver<ChangeEvent>) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let pump = tokio::spawn(pump_loop(url, user_id, options, events_tx));
        (Self { user_id, pump }, events_rx)
    }

    pub fn user_id(&self) -> usize {
        self.user_id
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_loop(
    url: String,
    user_id: usize,
    options: SubscriptionOptions,
    events: mpsc::Sender<ChangeEvent>,
) {
    let mut backoff = options.reconnect_initial;
    loop {
        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                debug!("Realtime channel connected for user {}", user_id);
                backoff = options.reconnect_initial;
                if let Err(err) = pump_connection(socket, user_id, &events).await {
                    warn!("Realtime channel dropped: {}", err);
                }
            }
            Err(err) => {
                warn!("Realtime connect to {} failed: {}", url, err);
            }
        }

        if events.is_closed() {
            debug!("Realtime consumer gone, stopping pump for user {}", user_id);
            return;
        }

        // Full jitter up to 20% keeps reconnect storms from synchronizing.
        let jittered = backoff + backoff.mul_f64(rand::random::<f64>() * 0.2);
        tokio::time::sleep(jittered).await;
        backoff = (backoff * 2).min(options.reconnect_max);
    }
}

async fn pump_connection(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    user_id: usize,
    events: &mpsc::Sender<ChangeEvent>,
) -> anyhow::Result<()> {
    let (mut sink, mut stream) = socket.split();

    let subscribe = serde_json::to_string(&SubscribeRequest::notifications(user_id))?;
    sink.send(Message::text(subscribe)).await?;

    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => match serde_json::from_str::<ChangeMessage>(&text) {
                Ok(message) => {
                    if events.send(message.into()).await.is_err() {
                        // Receiver dropped; nothing left to deliver to.
                        return Ok(());
                    }
                }
                Err(err) => warn!("Dropping undecodable realtime frame: {}", err),
            },
            Message::Close(_) => return Ok(()),
            // Pings are answered by the websocket layer itself.
            _ => {}
        }
    }
    Ok(())
}
