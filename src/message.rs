//! The chat log: an append-only, insertion-ordered message store.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sender name that marks a message as typed by the local user.
pub const LOCAL_SENDER: &str = "You";

/// Who a chat entry is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    User,
    Host,
    System,
}

impl std::fmt::Display for SenderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SenderKind::User => write!(f, "user"),
            SenderKind::Host => write!(f, "host"),
            SenderKind::System => write!(f, "system"),
        }
    }
}

/// A stored chat entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub text: String,
    pub sender_kind: SenderKind,
    /// Empty when the producer gave no name.
    pub sender_name: String,
    pub created_at_ms: u64,
}

impl ChatMessage {
    /// True for messages the local user sent.
    pub fn is_local(&self) -> bool {
        self.sender_name == LOCAL_SENDER
    }

    /// Participant messages are hidden while the participant toggle is off.
    pub fn is_participant(&self) -> bool {
        self.sender_kind == SenderKind::User && !self.is_local()
    }
}

/// A message as handed over by a producer, before it gets an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub text: String,
    pub sender_kind: SenderKind,
    pub sender_name: Option<String>,
}

impl NewMessage {
    pub fn new(text: impl Into<String>, sender_kind: SenderKind, sender_name: Option<String>) -> Self {
        Self {
            text: text.into(),
            sender_kind,
            sender_name,
        }
    }

    /// A message typed by the local user.
    pub fn local(text: impl Into<String>) -> Self {
        Self::new(text, SenderKind::User, Some(LOCAL_SENDER.to_string()))
    }

    pub fn attendee(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(text, SenderKind::User, Some(name.into()))
    }

    pub fn host(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(text, SenderKind::Host, Some(name.into()))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(text, SenderKind::System, None)
    }
}

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Append-only log of chat entries.
///
/// Order is insertion order and never changes. The participant toggle only
/// filters what [`query`](Self::query) returns with `visible_only = true`;
/// hidden messages stay stored and counted.
#[derive(Debug)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
    next_id: u64,
    show_participants: bool,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
            show_participants: true,
        }
    }

    /// Append a message stamped with the current wall clock.
    pub fn append(&mut self, message: NewMessage) -> &ChatMessage {
        self.append_at(message, now_ms())
    }

    /// Append a message with an explicit creation timestamp.
    ///
    /// A missing sender name is stored as the empty string.
    pub fn append_at(&mut self, message: NewMessage, created_at_ms: u64) -> &ChatMessage {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            text: message.text,
            sender_kind: message.sender_kind,
            sender_name: message.sender_name.unwrap_or_default(),
            created_at_ms,
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Messages in log order. With `visible_only`, participant messages are
    /// dropped while the participant toggle is off.
    pub fn query(&self, visible_only: bool) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|m| !visible_only || self.is_visible(m))
            .collect()
    }

    pub fn is_visible(&self, message: &ChatMessage) -> bool {
        self.show_participants || !message.is_participant()
    }

    pub fn set_participants_visible(&mut self, visible: bool) {
        self.show_participants = visible;
    }

    pub fn participants_visible(&self) -> bool {
        self.show_participants
    }

    pub fn visible_len(&self) -> usize {
        self.messages.iter().filter(|m| self.is_visible(m)).count()
    }

    pub fn participant_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_participant()).count()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }
}
