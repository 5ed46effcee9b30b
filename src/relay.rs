//! Feed relay: a WebSocket hub that fans chat events out to every subscriber.
//!
//! ## Design
//! - One `tokio::sync::broadcast` channel carries encoded feed events.
//! - Each WS client subscribes on connect; frames it sends that decode as a
//!   `message` event are re-broadcast to everyone, sender included.
//! - [`FeedRelay::publish`] injects events from the hosting process.
//!
//! Sessions consume the relay through [`RealtimeChannel`](crate::realtime::RealtimeChannel).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RelayError;
use crate::realtime::FeedEvent;

/// Frames buffered per subscriber before it starts lagging.
pub const RELAY_CHANNEL_CAP: usize = 256;

/// Shared fan-out state.
pub struct FeedRelay {
    tx: broadcast::Sender<String>,
    subscribers: AtomicUsize,
}

impl Default for FeedRelay {
    fn default() -> Self {
        Self::new(RELAY_CHANNEL_CAP)
    }
}

impl FeedRelay {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx,
            subscribers: AtomicUsize::new(0),
        }
    }

    /// Broadcast an event to every subscriber. Returns how many received it.
    pub fn publish(&self, event: &FeedEvent) -> usize {
        match serde_json::to_string(event) {
            Ok(text) => self.tx.send(text).unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "failed to encode feed event");
                0
            }
        }
    }

    /// Connected WebSocket subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    /// Accept WebSocket clients on `listener` forever.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), RelayError> {
        loop {
            let (stream, addr) = listener.accept().await?;
            let relay = Arc::clone(&self);
            tokio::spawn(async move {
                relay.handle_connection(stream, addr).await;
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(%addr, error = %e, "feed relay handshake failed");
                return;
            }
        };
        let subscriber = Uuid::new_v4();
        let mut feed_rx = self.tx.subscribe();
        let subscribers = self.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        info!(%addr, %subscriber, subscribers, "feed subscriber connected");

        let (mut ws_sink, mut ws_stream) = ws.split();

        loop {
            tokio::select! {
                frame = ws_stream.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => self.relay_inbound(&text),
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%subscriber, error = %e, "feed subscriber transport error");
                        break;
                    }
                },
                outbound = feed_rx.recv() => match outbound {
                    Ok(text) => {
                        if ws_sink.send(WsMessage::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%subscriber, skipped, "feed subscriber lagging, frames skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        let subscribers = self.subscribers.fetch_sub(1, Ordering::SeqCst) - 1;
        info!(%subscriber, subscribers, "feed subscriber disconnected");
    }

    fn relay_inbound(&self, text: &str) {
        match serde_json::from_str::<FeedEvent>(text) {
            Ok(event) if event.is_message() => {
                self.publish(&event);
            }
            Ok(event) => debug!(kind = %event.kind, "relay ignoring non-message event"),
            Err(e) => debug!(error = %e, "relay ignoring undecodable frame"),
        }
    }
}

/// Bind `127.0.0.1:port` and run a relay until the process exits.
pub async fn serve(port: u16) -> Result<(), RelayError> {
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(%addr, "feed relay listening");
    Arc::new(FeedRelay::default()).serve(listener).await
}
