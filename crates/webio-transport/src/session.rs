//! WebSocket session: one per browser connection.
//!
//! Three tasks cooperate per session:
//! - the read loop (this task) parses frames and queues messages
//! - a dispatch worker feeds queued messages to the [`DispatchBridge`]
//!   one at a time, preserving arrival order
//! - a writer drains frames queued through [`Connection`]
//!
//! The session ends on the first read failure, on a close frame, or on a
//! malformed (unparseable) JSON frame. Well-formed frames of an unknown
//! shape are logged and skipped. Dispatch failures are logged and never
//! end the session.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use webio_protocol::{InboundMessage, MessageError};

use crate::connection::{Connection, Outbound};

/// Error returned by a dispatch bridge. Logged, never propagated.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// Messages read ahead of the dispatch worker before reads pause.
const INBOX_CAPACITY: usize = 64;

/// Routes inbound messages into the UI object graph.
pub trait DispatchBridge: Send + Sync + 'static {
    /// Handle one message from `connection`.
    ///
    /// Called sequentially per connection. Errors and panics are caught at
    /// the session boundary.
    fn dispatch(
        &self,
        connection: &Connection,
        message: InboundMessage,
    ) -> impl std::future::Future<Output = Result<(), DispatchError>> + Send;

    /// Called once after the session's last message has been dispatched.
    fn disconnected(&self, _connection: &Connection) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    ClientClosed,
    TransportError,
    MalformedFrame,
}

/// Decrements the live-session counter however the session exits.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

pub(crate) async fn run_session<D: DispatchBridge>(
    socket: WebSocket,
    dispatch: Arc<D>,
    live_sessions: Arc<AtomicUsize>,
) {
    let _live = LiveGuard::enter(live_sessions.clone());

    let (ws_tx, mut ws_rx) = socket.split();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let connection = Connection::new(out_tx);
    let client_id = connection.id().to_string();
    info!(
        "Client connected: {client_id} (total: {})",
        live_sessions.load(Ordering::Relaxed)
    );

    let writer = tokio::spawn(write_loop(ws_tx, out_rx, connection.clone()));

    let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
    let worker = tokio::spawn(dispatch_loop(connection.clone(), dispatch.clone(), inbox_rx));

    let end = read_loop(&mut ws_rx, &connection, &inbox_tx).await;
    drop(inbox_tx);

    // Already-queued messages are still dispatched, in order.
    if let Err(e) = worker.await {
        error!("Dispatch worker for {client_id} failed: {e}");
    }
    dispatch.disconnected(&connection).await;

    connection.close();
    let _ = writer.await;

    info!("Client disconnected: {client_id} ({end:?})");
}

async fn read_loop(
    ws_rx: &mut SplitStream<WebSocket>,
    connection: &Connection,
    inbox: &mpsc::Sender<InboundMessage>,
) -> SessionEnd {
    let client_id = connection.id();
    loop {
        let parsed = match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => InboundMessage::parse(text.as_str()),
            Some(Ok(Message::Binary(data))) => InboundMessage::from_slice(&data),
            // The socket answers pings itself.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => return SessionEnd::ClientClosed,
            Some(Err(e)) => {
                warn!("WebSocket error for {client_id}: {e}");
                return SessionEnd::TransportError;
            }
        };

        match parsed {
            Ok(message) => {
                debug!("Received {} message from {client_id}", message.kind());
                if inbox.send(message).await.is_err() {
                    // Worker gone: nothing left to dispatch to.
                    return SessionEnd::TransportError;
                }
            }
            Err(e) => {
                if let Some(end) = reject_frame(client_id, &e) {
                    return end;
                }
            }
        }
    }
}

fn reject_frame(client_id: &str, error: &MessageError) -> Option<SessionEnd> {
    if error.terminates_session() {
        warn!("Closing session {client_id}: {error}");
        Some(SessionEnd::MalformedFrame)
    } else {
        warn!("Skipping frame from {client_id}: {error}");
        None
    }
}

async fn dispatch_loop<D: DispatchBridge>(
    connection: Connection,
    dispatch: Arc<D>,
    mut inbox: mpsc::Receiver<InboundMessage>,
) {
    while let Some(message) = inbox.recv().await {
        let kind = message.kind();
        let outcome = AssertUnwindSafe(dispatch.dispatch(&connection, message))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Dispatch of {kind} message failed for {}: {e}", connection.id()),
            Err(_) => error!("Dispatch of {kind} message panicked for {}", connection.id()),
        }
    }
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    connection: Connection,
) {
    while let Some(frame) = rx.recv().await {
        let message = match frame {
            Outbound::Text(text) => Message::Text(text.into()),
            Outbound::Close => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        };
        if let Err(e) = ws_tx.send(message).await {
            warn!("Failed to write to {}: {e}", connection.id());
            break;
        }
    }
    connection.mark_closed();
}
