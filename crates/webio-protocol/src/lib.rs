//! WebIO Protocol Types
//!
//! Wire messages exchanged with the browser over the WebSocket channel,
//! the server configuration resolved once per process, and the error
//! taxonomy shared by the transport and server crates.

pub mod config;
pub mod error;
pub mod message;

pub use config::{ConfigKeys, ServerConfig};
pub use error::{ConfigError, MessageError};
pub use message::{InboundMessage, MessageKind, OutboundMessage};
