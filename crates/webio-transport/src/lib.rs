//! WebIO Transport Layer
//!
//! One HTTP listener per server process that:
//! - upgrades requests on the configured route to WebSocket sessions
//! - runs each session's read loop, feeding a [`DispatchBridge`] in order
//! - serves every other path through the embedding application's
//!   [`PageHandler`] first, then the [`AssetLookup`], then "not found"
//!
//! The UI object graph is reached only through the `DispatchBridge` seam.

pub mod assets;
pub mod connection;
pub mod http;
pub mod server;
pub mod session;

pub use assets::{AssetError, AssetLookup, AssetRegistry, ASSET_PREFIX};
pub use connection::{Connection, SendError};
pub use http::{NoPages, PageHandler, PageRequest, NOT_FOUND_BODY};
pub use server::{Handlers, ServerError, ServerProcess};
pub use session::{DispatchBridge, DispatchError};
