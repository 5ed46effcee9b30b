//! Inbound realtime feed of externally originated chat messages.
//!
//! One subscription per mounted session. The feed only ever adds messages;
//! losing it is logged and otherwise ignored.

use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tracing::{debug, info, warn};

use crate::error::RealtimeError;
use crate::message::{NewMessage, SenderKind};

/// Wire shape of a feed event.
///
/// Only `type == "message"` events reach the chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "messageType", default = "default_sender")]
    pub message_type: SenderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

fn default_sender() -> SenderKind {
    SenderKind::User
}

impl FeedEvent {
    pub fn message(text: impl Into<String>, message_type: SenderKind, user: Option<String>) -> Self {
        Self {
            kind: "message".to_string(),
            text: text.into(),
            message_type,
            user,
        }
    }

    pub fn is_message(&self) -> bool {
        self.kind == "message"
    }

    pub fn into_message(self) -> NewMessage {
        NewMessage::new(self.text, self.message_type, self.user)
    }
}

/// Decode one text frame. Returns `None` for non-message or undecodable events.
pub fn parse_feed_event(raw: &str) -> Option<NewMessage> {
    match serde_json::from_str::<FeedEvent>(raw) {
        Ok(event) if event.is_message() => Some(event.into_message()),
        Ok(event) => {
            debug!(kind = %event.kind, "ignoring non-message feed event");
            None
        }
        Err(e) => {
            debug!(error = %e, "ignoring undecodable feed frame");
            None
        }
    }
}

/// Forward every message event from `stream` into `tx`.
///
/// Ends when the stream ends, the server closes, the transport errors or the
/// receiver is dropped. Returns the number of messages forwarded.
pub async fn pump<S, E>(mut stream: S, tx: UnboundedSender<E>) -> usize
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
    E: From<NewMessage>,
{
    let mut forwarded = 0;
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                if let Some(message) = parse_feed_event(&text) {
                    if tx.send(E::from(message)).is_err() {
                        break;
                    }
                    forwarded += 1;
                }
            }
            Ok(WsMessage::Close(_)) => {
                info!("realtime feed closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                let err = RealtimeError::Transport(Box::new(e));
                warn!(error = %err, "realtime feed lost; simulated chat continues");
                break;
            }
        }
    }
    forwarded
}

/// Handle to the session's single feed subscription.
pub struct RealtimeChannel {
    task: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    /// Connect to a WebSocket feed at `url` and forward its messages into `tx`.
    ///
    /// Connection failure is logged and leaves the channel idle.
    pub fn connect<E>(url: impl Into<String>, tx: UnboundedSender<E>) -> Self
    where
        E: From<NewMessage> + Send + 'static,
    {
        let url = url.into();
        let task = tokio::spawn(async move {
            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((ws, _)) => {
                    info!(%url, "realtime feed connected");
                    let forwarded = pump(ws, tx).await;
                    debug!(%url, forwarded, "realtime feed ended");
                }
                Err(source) => {
                    let err = RealtimeError::Connect {
                        url,
                        source: Box::new(source),
                    };
                    warn!(error = %err, "realtime feed unavailable; simulated chat continues");
                }
            }
        });
        Self { task: Some(task) }
    }

    /// Subscribe to an already-open stream of WebSocket frames.
    pub fn from_stream<S, E>(stream: S, tx: UnboundedSender<E>) -> Self
    where
        S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Send + Unpin + 'static,
        E: From<NewMessage> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            pump(stream, tx).await;
        });
        Self { task: Some(task) }
    }

    /// Close the subscription. Returns false if it was already closed.
    pub fn close(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.close();
    }
}
