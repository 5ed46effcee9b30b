//! Simulated host replies to local submissions.
//!
//! One submission at a time moves `Idle -> Typing -> Idle`. The remote call
//! is a single attempt; any failure turns into one fixed apology from the
//! host, so callers never see a reply error.

use std::collections::BTreeSet;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ReplyError;
use crate::message::NewMessage;

/// Host message shown whenever a reply cannot be produced.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a moment!";

/// Body POSTed to the response endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplyRequest {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ReplyRequest {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: "user".to_string(),
        }
    }
}

/// Success body of the response endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyBody {
    pub response: String,
}

/// Produces the host's answer to a submitted message.
pub trait Responder: Send + Sync {
    fn reply<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, ReplyError>>;
}

/// Responder backed by an HTTP endpoint.
pub struct HttpResponder {
    url: String,
    client: reqwest::Client,
}

impl HttpResponder {
    pub fn new(url: impl Into<String>) -> Self {
        // Falls back to a default client instead of panicking if the builder fails.
        let client = reqwest::Client::builder().build().unwrap_or_default();
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `{ message, type: "user" }` and extract `response`.
    ///
    /// # Returns
    /// - `Ok(text)` on a 2xx response whose `response` field is a non-empty string.
    /// - `Err(ReplyError::Connect)` when the request cannot be sent.
    /// - `Err(ReplyError::Http)` on a non-2xx status.
    /// - `Err(ReplyError::Malformed)` when the body has no usable `response`.
    pub async fn post(&self, text: &str) -> Result<String, ReplyError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&ReplyRequest::user(text))
            .send()
            .await
            .map_err(|e| ReplyError::Connect {
                url: self.url.clone(),
                detail: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(ReplyError::Http {
                status: resp.status().as_u16(),
                url: self.url.clone(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| ReplyError::Malformed {
            detail: e.to_string(),
        })?;
        let body: ReplyBody =
            serde_json::from_slice(&bytes).map_err(|e| ReplyError::Malformed {
                detail: e.to_string(),
            })?;
        if body.response.trim().is_empty() {
            return Err(ReplyError::Malformed {
                detail: "empty response".to_string(),
            });
        }
        Ok(body.response)
    }
}

impl Responder for HttpResponder {
    fn reply<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, ReplyError>> {
        Box::pin(self.post(text))
    }
}

/// Responder used when no endpoint is configured. Always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineResponder;

impl Responder for OfflineResponder {
    fn reply<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<String, ReplyError>> {
        Box::pin(async { Err(ReplyError::NotConfigured) })
    }
}

/// Where a submission is in its reply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyPhase {
    Idle,
    Typing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A reply is still in flight.
    Busy,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The trimmed text was accepted and a reply cycle started.
    Accepted(String),
    Ignored(IgnoreReason),
}

/// Reply state machine for local submissions.
///
/// A submission made while a reply is in flight is dropped, not queued.
#[derive(Debug)]
pub struct ResponseSimulator {
    phase: ReplyPhase,
    ignored: u64,
}

impl Default for ResponseSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSimulator {
    pub fn new() -> Self {
        Self {
            phase: ReplyPhase::Idle,
            ignored: 0,
        }
    }

    pub fn phase(&self) -> ReplyPhase {
        self.phase
    }

    /// Submissions dropped so far.
    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    /// Start a reply cycle for `text` if none is running.
    pub fn begin(&mut self, text: &str) -> SubmitOutcome {
        let text = text.trim();
        let outcome = if text.is_empty() {
            SubmitOutcome::Ignored(IgnoreReason::Blank)
        } else if self.phase == ReplyPhase::Typing {
            SubmitOutcome::Ignored(IgnoreReason::Busy)
        } else {
            self.phase = ReplyPhase::Typing;
            SubmitOutcome::Accepted(text.to_string())
        };
        if let SubmitOutcome::Ignored(reason) = &outcome {
            self.ignored += 1;
            debug!(?reason, "submission ignored");
        }
        outcome
    }

    /// Finish the running cycle and produce the host message to append.
    pub fn finish(&mut self, result: Result<String, ReplyError>, host_name: &str) -> NewMessage {
        self.phase = ReplyPhase::Idle;
        match result {
            Ok(text) => NewMessage::host(host_name, text),
            Err(e) => {
                warn!(error = %e, "host reply failed, sending fallback");
                NewMessage::host(host_name, FALLBACK_REPLY)
            }
        }
    }
}

/// Producers that can hold the "host is typing" indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypingSource {
    Reply,
    /// Index into the timed Q&A script.
    Script(usize),
}

/// The shared "host is typing" indicator.
///
/// Visible while any source holds it, so one producer clearing its window
/// never hides another's.
#[derive(Debug, Default)]
pub struct TypingIndicator {
    holders: BTreeSet<TypingSource>,
}

impl TypingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, source: TypingSource) {
        self.holders.insert(source);
    }

    /// Release `source`. Returns true if it was holding the indicator.
    pub fn hide(&mut self, source: TypingSource) -> bool {
        self.holders.remove(&source)
    }

    pub fn is_visible(&self) -> bool {
        !self.holders.is_empty()
    }

    pub fn text(&self, host_name: &str) -> Option<String> {
        self.is_visible().then(|| format!("{host_name} is typing..."))
    }
}
