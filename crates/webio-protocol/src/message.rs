//! Inbound and outbound WebSocket messages.
//!
//! Every frame carries one UTF-8 JSON document. Inbound documents are
//! objects discriminated by a `type` field drawn from a closed set of
//! kinds; the full object is kept so the dispatch side sees exactly what
//! the browser sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MessageError;

/// Known inbound message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// First message a client sends after connecting.
    Sync,
    /// A UI event (click, input, observable change) from the browser.
    Event,
    /// A command addressed to a scope.
    Command,
    /// A request expecting a `response` message back.
    Request,
    /// A reply to a server-initiated request.
    Response,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        Self::Sync,
        Self::Event,
        Self::Command,
        Self::Request,
        Self::Response,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Event => "event",
            Self::Command => "command",
            Self::Request => "request",
            Self::Response => "response",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    kind: MessageKind,
    body: Value,
}

impl InboundMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Parse a binary frame holding UTF-8 JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON value.
    pub fn from_value(body: Value) -> Result<Self, MessageError> {
        let object = body.as_object().ok_or(MessageError::NotAnObject)?;
        let tag = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingType)?;
        let kind = MessageKind::from_tag(tag)
            .ok_or_else(|| MessageError::UnknownKind(tag.to_string()))?;
        Ok(Self { kind, body })
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The complete JSON object, `type` field included.
    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}

/// Server → browser message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Instruct the client to run a command against a scope.
    Command {
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        data: Value,
    },
    /// Reply to a client `request`.
    Response {
        #[serde(rename = "requestId")]
        request_id: Value,
        #[serde(default)]
        payload: Value,
    },
    /// Push an observable update.
    Update {
        scope: String,
        name: String,
        value: Value,
    },
}

impl OutboundMessage {
    pub fn command(command: impl Into<String>, scope: Option<String>, data: Value) -> Self {
        Self::Command {
            command: command.into(),
            scope,
            data,
        }
    }

    pub fn response(request_id: Value, payload: Value) -> Self {
        Self::Response {
            request_id,
            payload,
        }
    }

    pub fn update(scope: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        Self::Update {
            scope: scope.into(),
            name: name.into(),
            value,
        }
    }
}
