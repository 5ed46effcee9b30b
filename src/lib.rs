//! Live-chat engagement simulator for a webinar page.
//!
//! A mounted [`session::ChatSession`] merges four producers into one ordered
//! chat log: a realtime WebSocket feed, replies to the local user's messages,
//! a scripted schedule of attendee chatter and host Q&A, and a countdown
//! offer. Everything is torn down together on unmount.
//!
//! ```no_run
//! use webinar_chat::session::ChatSession;
//!
//! # async fn demo() -> Result<(), webinar_chat::error::SessionError> {
//! let handle = ChatSession::builder().mount()?;
//! handle.submit("Is this recorded?")?;
//! let summary = handle.unmount().await?;
//! println!("{} messages", summary.messages);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod message;
pub mod offer;
pub mod realtime;
pub mod relay;
pub mod render;
pub mod responder;
pub mod schedule;
pub mod scheduler;
pub mod scroll;
pub mod session;

pub use config::SessionConfig;
pub use error::{RealtimeError, RelayError, ReplyError, SessionError};
pub use message::{ChatMessage, MessageStore, NewMessage, SenderKind};
pub use offer::{OfferCountdown, OfferPhase};
pub use responder::{HttpResponder, OfflineResponder, Responder};
pub use session::{ChatSession, ChatSnapshot, SessionHandle, SessionSummary, ViewAnchors};
