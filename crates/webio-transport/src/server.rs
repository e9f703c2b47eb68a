//! WebIO server process using Axum.
//!
//! Binds one listener, upgrades the configured route to WebSocket sessions,
//! and routes every other request to the HTTP asset handler. The accept
//! loop runs as a background task that stops on [`ServerProcess::stop`].
//! Stopping releases the listener but leaves already-upgraded sessions
//! running until their own transport closes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::{HeaderMap, Method, Uri},
    response::Response,
    routing::get,
};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use webio_protocol::{ConfigError, ServerConfig};

use crate::assets::AssetLookup;
use crate::http::{self, PageHandler, PageRequest};
use crate::session::{self, DispatchBridge};

/// Upper bound on waiting for the accept loop to wind down.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// The embedding application's collaborators for one server process.
pub struct Handlers<P, D> {
    pub pages: Arc<P>,
    pub assets: Arc<dyn AssetLookup>,
    pub dispatch: Arc<D>,
}

impl<P, D> Handlers<P, D> {
    pub fn new(pages: Arc<P>, assets: Arc<dyn AssetLookup>, dispatch: Arc<D>) -> Self {
        Self {
            pages,
            assets,
            dispatch,
        }
    }
}

impl<P, D> Clone for Handlers<P, D> {
    fn clone(&self) -> Self {
        Self {
            pages: self.pages.clone(),
            assets: self.assets.clone(),
            dispatch: self.dispatch.clone(),
        }
    }
}

/// Shared state for request handlers.
struct AppState<P, D> {
    handlers: Handlers<P, D>,
    /// Live WebSocket sessions
    live_sessions: Arc<AtomicUsize>,
}

/// A running listener plus its accept-loop task.
pub struct ServerProcess {
    /// Configuration with the actually bound port
    config: ServerConfig,
    local_addr: SocketAddr,
    /// Shutdown signal
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
    /// Accept-loop task handle
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Set once the accept loop has returned
    finished: Arc<AtomicBool>,
    live_sessions: Arc<AtomicUsize>,
}

impl ServerProcess {
    /// Bind `config.host:config.http_port` and start accepting.
    pub async fn start<P, D>(config: &ServerConfig, handlers: Handlers<P, D>) -> Result<Self, ServerError>
    where
        P: PageHandler,
        D: DispatchBridge,
    {
        config.validate()?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let live_sessions = Arc::new(AtomicUsize::new(0));

        let state = Arc::new(AppState {
            handlers,
            live_sessions: live_sessions.clone(),
        });

        let mut app = Router::new()
            .route(&config.ws_route, get(ws_upgrade_handler::<P, D>))
            .fallback(http_handler::<P, D>)
            .with_state(state);
        if config.enable_cors {
            app = app.layer(CorsLayer::permissive());
        }

        let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.http_port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_address(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let config = config.clone().with_bound_port(local_addr.port());

        info!("WebIO server listening on http://{local_addr} (websocket: {})", config.ws_url);

        let finished = Arc::new(AtomicBool::new(false));
        let done = finished.clone();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                error!("WebIO server on {local_addr} exited: {e}");
            }
            done.store(true, Ordering::Release);
        });

        Ok(Self {
            config,
            local_addr,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
            finished,
            live_sessions,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Number of WebSocket sessions currently open.
    pub fn connection_count(&self) -> usize {
        self.live_sessions.load(Ordering::Relaxed)
    }

    /// Whether the accept loop is still running.
    pub fn is_running(&self) -> bool {
        if self.finished.load(Ordering::Acquire) {
            return false;
        }
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop accepting and release the listener.
    ///
    /// Open WebSocket sessions are not closed.
    pub async fn stop(&self) {
        let shutdown_tx = self.shutdown_tx.lock().take();
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(()).await;
        }

        let handle = self.handle.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
                warn!("WebIO server on {} did not stop in time, aborting", self.local_addr);
                handle.abort();
            }
        }

        self.finished.store(true, Ordering::Release);
        info!("WebIO server on {} stopped", self.local_addr);
    }
}

impl std::fmt::Debug for ServerProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerProcess")
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .field("connections", &self.connection_count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn ws_upgrade_handler<P: PageHandler, D: DispatchBridge>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<P, D>>>,
) -> Response {
    let dispatch = state.handlers.dispatch.clone();
    let live_sessions = state.live_sessions.clone();

    ws.on_failed_upgrade(|e| warn!("WebSocket upgrade failed: {e}"))
        .on_upgrade(move |socket| session::run_session(socket, dispatch, live_sessions))
}

async fn http_handler<P: PageHandler, D: DispatchBridge>(
    State(state): State<Arc<AppState<P, D>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = PageRequest::new(method, uri, headers);
    http::handle_request(
        state.handlers.pages.as_ref(),
        state.handlers.assets.as_ref(),
        request,
    )
    .await
}
