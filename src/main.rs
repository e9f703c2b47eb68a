//! WebIO demo server
//!
//! Serves a counter page at `/` whose button clicks travel over the
//! WebSocket channel and whose count is pushed back to every open tab.
//!
//! Usage:
//!   webio                                  # 127.0.0.1:8081, or WEBIO_* env vars
//!   webio --port 9000                      # Custom port
//!   webio --assets-dir ./assets            # Where webio-bundle.js / webio-glue.js live
//!   webio --print-snippet                  # Also print an embeddable HTML snippet

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Context;
use axum::response::{Html, IntoResponse, Response};
use clap::Parser;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use webio_protocol::{InboundMessage, MessageKind, OutboundMessage, ServerConfig};
use webio_server::{BootstrapAssets, ServerRegistry, WebIo, global_config, render_fragment};
use webio_transport::{
    AssetLookup, AssetRegistry, Connection, DispatchBridge, DispatchError, Handlers, PageHandler,
    PageRequest,
};

#[derive(Parser, Debug)]
#[command(name = "webio", about = "WebIO demo server: UI over HTTP + WebSocket")]
struct Cli {
    /// Hostname to bind to (overrides WEBIO_SERVER_HOST_URL; explicit
    /// WEBIO_WEBSOCKET_URL and WEBIO_BASE_URL are kept)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, 0 for OS-assigned (overrides WEBIO_HTTP_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// WebSocket route (overrides WEBIO_WEBSOCKET_ROUTE)
    #[arg(long)]
    ws_route: Option<String>,

    /// Directory holding the client bundle and glue scripts
    #[arg(long, default_value = "assets")]
    assets_dir: PathBuf,

    /// Allow cross-origin requests
    #[arg(long)]
    cors: bool,

    /// Print an embeddable HTML snippet after startup
    #[arg(long)]
    print_snippet: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Demo application
// ─────────────────────────────────────────────────────────────────────────────

const SCOPE: &str = "counter";

fn counter_node() -> Value {
    json!({
        "tag": "div",
        "children": [
            {"tag": "h1", "text": "WebIO counter"},
            {"tag": "span", "bind": "counter.count", "text": 0},
            {"tag": "button", "text": "+1", "scope": SCOPE, "on": {"click": "increment"}},
        ]
    })
}

/// Shared counter; every open tab sees each update.
#[derive(Default)]
struct CounterApp {
    count: AtomicI64,
    connections: Mutex<Vec<Connection>>,
}

impl CounterApp {
    fn broadcast(&self, message: &OutboundMessage) {
        let mut connections = self.connections.lock();
        connections.retain(|conn| conn.send(message).is_ok());
    }
}

impl DispatchBridge for CounterApp {
    async fn dispatch(&self, connection: &Connection, message: InboundMessage) -> Result<(), DispatchError> {
        debug!("{} message from {}: {}", message.kind(), connection.id(), message.body());

        match message.kind() {
            MessageKind::Sync => {
                self.connections.lock().push(connection.clone());
                let count = self.count.load(Ordering::Relaxed);
                connection.send(&OutboundMessage::update(SCOPE, "count", json!(count)))?;
            }
            MessageKind::Event => match message.get("name").and_then(Value::as_str) {
                Some("increment") => {
                    let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
                    info!("Counter incremented to {count}");
                    self.broadcast(&OutboundMessage::update(SCOPE, "count", json!(count)));
                }
                Some(other) => return Err(format!("unknown event {other:?}").into()),
                None => return Err("event without a name".into()),
            },
            MessageKind::Request => {
                let id = message.get("requestId").cloned().unwrap_or(Value::Null);
                let count = self.count.load(Ordering::Relaxed);
                connection.send(&OutboundMessage::response(id, json!({ "count": count })))?;
            }
            MessageKind::Command | MessageKind::Response => {}
        }
        Ok(())
    }

    async fn disconnected(&self, connection: &Connection) {
        self.connections.lock().retain(|conn| conn != connection);
    }
}

/// Serves the bootstrap page at `/` with a fresh mount point per request.
#[derive(Default)]
struct IndexPage {
    head: RwLock<Option<String>>,
}

impl IndexPage {
    fn set_head(&self, scripts: String) {
        *self.head.write() = Some(scripts);
    }
}

impl PageHandler for IndexPage {
    async fn handle(&self, request: &PageRequest) -> Option<Response> {
        if request.path() != "/" {
            return None;
        }
        let head = self.head.read().clone()?;
        let fragment = render_fragment(&counter_node());
        let page = format!(
            "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>WebIO</title>\n{head}</head>\n<body>\n{fragment}\n</body>\n</html>\n"
        );
        Some(Html(page).into_response())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup
// ─────────────────────────────────────────────────────────────────────────────

fn resolve_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = global_config()?.clone();
    if cli.host.is_some() || cli.port.is_some() {
        let host = cli.host.clone().unwrap_or_else(|| config.host.clone());
        let port = cli.port.unwrap_or(config.http_port);
        config = config.with_address(host, port)?;
    }
    if let Some(route) = &cli.ws_route {
        config = config.with_ws_route(route.clone())?;
    }
    Ok(config.with_cors(cli.cors))
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(log_path) = &cli.log_file {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let config = resolve_config(&cli).context("Invalid server configuration")?;
    let registry = Arc::new(ServerRegistry::new(config));
    let assets: Arc<dyn AssetLookup> = Arc::new(AssetRegistry::new());
    let index = Arc::new(IndexPage::default());
    let app = Arc::new(CounterApp::default());

    let webio = WebIo::new(
        registry,
        Handlers::new(index.clone(), assets, app),
        BootstrapAssets::in_dir(&cli.assets_dir),
    );

    let mut snippet = String::new();
    webio
        .show_application(&mut snippet, &counter_node())
        .await
        .context("Failed to start WebIO server")?;

    let process = webio.ensure_server().await?;
    index.set_head(webio.bootstrap_scripts(&process)?);

    println!();
    println!("  WebIO server running");
    println!();
    println!("  Page:       http://{}/", process.local_addr());
    println!("  WebSocket:  {}", process.config().ws_url);
    println!();
    if cli.print_snippet {
        println!("{snippet}");
        println!();
    }
    println!("  Press Ctrl+C to stop.");
    println!();

    tokio::signal::ctrl_c().await?;

    println!("  Shutting down...");
    webio.registry().shutdown().await;
    println!("  Server stopped.");
    Ok(())
}
