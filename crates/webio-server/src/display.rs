//! Display entry point: the integration surface for embedding applications.
//!
//! `show_application` makes sure the singleton server is up, then writes:
//! 1. a script defining the WebSocket URL the client connects to
//! 2. script tags for the client bundle and connection glue, served as
//!    registered assets
//! 3. the mount fragment for the node

use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use webio_transport::{AssetLookup, DispatchBridge, Handlers, PageHandler, ServerProcess};

use crate::error::WebIoError;
use crate::registry::{ServerRegistry, StartMode};
use crate::render::{MountFragment, Render, render_fragment, script_json};

/// Local files the browser loads before any fragment mounts.
#[derive(Debug, Clone)]
pub struct BootstrapAssets {
    /// Client runtime defining `WebIO.mount`
    pub bundle: PathBuf,
    /// Opens the WebSocket and wires it to the runtime
    pub glue: PathBuf,
}

impl BootstrapAssets {
    pub const BUNDLE_FILE: &str = "webio-bundle.js";
    pub const GLUE_FILE: &str = "webio-glue.js";

    /// The standard file names inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            bundle: dir.join(Self::BUNDLE_FILE),
            glue: dir.join(Self::GLUE_FILE),
        }
    }
}

/// Binds a registry to the application's page handler, asset lookup, and
/// dispatch bridge.
pub struct WebIo<P, D> {
    registry: Arc<ServerRegistry>,
    handlers: Handlers<P, D>,
    bootstrap: BootstrapAssets,
}

impl<P, D> WebIo<P, D>
where
    P: PageHandler,
    D: DispatchBridge,
{
    pub fn new(
        registry: Arc<ServerRegistry>,
        handlers: Handlers<P, D>,
        bootstrap: BootstrapAssets,
    ) -> Self {
        Self {
            registry,
            handlers,
            bootstrap,
        }
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn assets(&self) -> &Arc<dyn AssetLookup> {
        &self.handlers.assets
    }

    /// Start the singleton server if it is not already running.
    pub async fn ensure_server(&self) -> Result<Arc<ServerProcess>, WebIoError> {
        let process = self
            .registry
            .get_or_start(self.handlers.clone(), StartMode::Singleton)
            .await?;
        Ok(process)
    }

    /// Write bootstrap scripts and a mount fragment for `node` to `out`.
    ///
    /// Safe to repeat: the server is reused, but every call draws a new
    /// mount identifier.
    pub async fn show_application<W, N>(&self, out: &mut W, node: &N) -> Result<MountFragment, WebIoError>
    where
        W: Write,
        N: Render + ?Sized,
    {
        let process = self.ensure_server().await?;
        let scripts = self.bootstrap_scripts(&process)?;
        let fragment = render_fragment(node);
        out.write_str(&scripts)?;
        out.write_str(&fragment.to_html())?;
        Ok(fragment)
    }

    /// The `<script>` tags that must precede any mount fragment.
    pub fn bootstrap_scripts(&self, process: &ServerProcess) -> Result<String, WebIoError> {
        let config = process.config();
        let assets = &self.handlers.assets;
        let bundle_url = config.asset_url(&assets.register(&self.bootstrap.bundle)?);
        let glue_url = config.asset_url(&assets.register(&self.bootstrap.glue)?);

        let mut html = String::new();
        writeln!(
            html,
            "<script>window._webIOWebSocketURL = {};</script>",
            script_json(&Value::String(config.ws_url.clone()))
        )?;
        writeln!(html, r#"<script src="{}"></script>"#, escape_attr(&bundle_url))?;
        writeln!(html, r#"<script src="{}"></script>"#, escape_attr(&glue_url))?;
        Ok(html)
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
