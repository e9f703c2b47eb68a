//! Connection adapter: the handle the dispatch side uses to talk back to
//! one browser session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection is closed")]
    Closed,

    #[error("failed to serialize outbound message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Frames queued for the session's writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    Text(String),
    Close,
}

struct Inner {
    id: String,
    tx: mpsc::UnboundedSender<Outbound>,
    open: AtomicBool,
}

/// Cheaply cloneable handle to one WebSocket session.
///
/// Writes are best-effort: a failed send is reported to the caller and
/// never retried.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: uuid::Uuid::new_v4().to_string(),
                tx,
                open: AtomicBool::new(true),
            }),
        }
    }

    /// Unique per session, for logging and bookkeeping only.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire) && !self.inner.tx.is_closed()
    }

    /// Serialize `data` to JSON and queue it as a single text frame.
    pub fn send<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), SendError> {
        if !self.is_open() {
            debug!("Dropping message for closed connection {}", self.id());
            return Err(SendError::Closed);
        }
        let text = serde_json::to_string(data)?;
        self.push(Outbound::Text(text))
    }

    pub(crate) fn push(&self, frame: Outbound) -> Result<(), SendError> {
        self.inner.tx.send(frame).map_err(|_| {
            self.mark_closed();
            SendError::Closed
        })
    }

    /// Ask the writer to send a close frame and stop.
    pub(crate) fn close(&self) {
        if self.inner.open.swap(false, Ordering::AcqRel) {
            let _ = self.inner.tx.send(Outbound::Close);
        }
    }

    pub(crate) fn mark_closed(&self) {
        self.inner.open.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("open", &self.is_open())
            .finish()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}
