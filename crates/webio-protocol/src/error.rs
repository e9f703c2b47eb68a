//! Error types for configuration resolution and inbound frame parsing.

use thiserror::Error;

/// Configuration could not be resolved. Fatal to server start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid HTTP port {value:?} (from {key})")]
    InvalidPort { key: &'static str, value: String },

    #[error("invalid WebSocket route {0:?}: must be a literal path starting with '/' other than '/'")]
    InvalidRoute(String),

    #[error("invalid bind host {0:?}")]
    InvalidHost(String),
}

/// Classification of an inbound frame that could not become an
/// [`InboundMessage`](crate::InboundMessage).
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed JSON frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no string \"type\" field")]
    MissingType,

    #[error("unknown message kind {0:?}")]
    UnknownKind(String),
}

impl MessageError {
    /// Whether a session receiving this frame must close.
    ///
    /// Only unparseable JSON ends the session; well-formed JSON of an
    /// unexpected shape is logged and skipped.
    pub fn terminates_session(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}
