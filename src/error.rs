//! Error types for every boundary of the chat session.
//!
//! Only [`SessionError`] ever reaches a library caller. Reply and transport
//! failures are recovered inside the session and surface as chat behaviour.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors returned by session construction and the session handle.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A view anchor the session needs was not provided by the host surface.
    #[error("chat view anchor '{0}' is missing; session not mounted")]
    MissingAnchor(String),
    /// The session has already been torn down.
    #[error("chat session is no longer mounted")]
    Unmounted,
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Failure of a single host-reply request.
#[derive(Debug, Error)]
pub enum ReplyError {
    /// No response endpoint is configured for this session.
    #[error("no response endpoint configured")]
    NotConfigured,
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },
    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    /// The body was not `{ "response": "<non-empty string>" }`.
    #[error("malformed reply body: {detail}")]
    Malformed { detail: String },
}

/// Failure of the realtime feed subscription. Always non-fatal.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("realtime connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("realtime transport error: {0}")]
    Transport(#[source] Box<tungstenite::Error>),
}

/// Errors from the feed relay server.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind relay on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_error_display_http() {
        let err = ReplyError::Http {
            status: 503,
            url: "http://localhost:9000/api/chat".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("503"), "expected status in display: {s}");
        assert!(s.contains("/api/chat"), "expected url: {s}");
    }

    #[test]
    fn reply_error_display_malformed() {
        let err = ReplyError::Malformed {
            detail: "missing field `response`".to_string(),
        };
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn session_error_names_missing_anchor() {
        let err = SessionError::MissingAnchor("chat-input".to_string());
        assert!(err.to_string().contains("chat-input"));
    }

    #[test]
    fn realtime_error_keeps_source() {
        use std::error::Error as _;
        let err = RealtimeError::Transport(Box::new(tungstenite::Error::ConnectionClosed));
        assert!(err.source().is_some());
    }

    #[test]
    fn relay_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: RelayError = io.into();
        assert!(matches!(err, RelayError::Io(_)));
    }
}
