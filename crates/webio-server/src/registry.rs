//! ServerRegistry: at most one running server process per registry in
//! singleton mode, plus the process-wide memoized configuration.

use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;
use tracing::{info, warn};
use webio_protocol::{ConfigError, ServerConfig};
use webio_transport::{DispatchBridge, Handlers, PageHandler, ServerError, ServerProcess};

static GLOBAL_CONFIG: OnceLock<ServerConfig> = OnceLock::new();
static GLOBAL_REGISTRY: OnceLock<ServerRegistry> = OnceLock::new();

/// The configuration resolved from the environment on first call.
///
/// Later environment changes have no effect for the rest of the process.
/// A resolution error is returned without memoizing anything.
pub fn global_config() -> Result<&'static ServerConfig, ConfigError> {
    if let Some(config) = GLOBAL_CONFIG.get() {
        return Ok(config);
    }
    let resolved = ServerConfig::from_env()?;
    // A racing caller may have won; its value is the one kept.
    Ok(GLOBAL_CONFIG.get_or_init(|| resolved))
}

/// Whether a start request may reuse a registered process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Reuse the registered process, starting and registering one if none.
    Singleton,
    /// Always start a fresh, unregistered process.
    Independent,
}

/// Owns the singleton server slot.
///
/// The slot is guarded by an async mutex held across the bind, so racing
/// first callers observe exactly one listener.
pub struct ServerRegistry {
    config: ServerConfig,
    slot: Mutex<Option<Arc<ServerProcess>>>,
}

impl ServerRegistry {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    /// The process-wide registry, configured from [`global_config`].
    pub fn global() -> Result<&'static ServerRegistry, ConfigError> {
        if let Some(registry) = GLOBAL_REGISTRY.get() {
            return Ok(registry);
        }
        let config = global_config()?.clone();
        Ok(GLOBAL_REGISTRY.get_or_init(|| ServerRegistry::new(config)))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Return the registered process or start one.
    ///
    /// In singleton mode a registered process whose accept loop has exited
    /// is replaced rather than returned.
    pub async fn get_or_start<P, D>(
        &self,
        handlers: Handlers<P, D>,
        mode: StartMode,
    ) -> Result<Arc<ServerProcess>, ServerError>
    where
        P: PageHandler,
        D: DispatchBridge,
    {
        if mode == StartMode::Independent {
            let process = ServerProcess::start(&self.config, handlers).await?;
            info!("Started independent WebIO server on {}", process.local_addr());
            return Ok(Arc::new(process));
        }

        let mut slot = self.slot.lock().await;
        if let Some(existing) = slot.as_ref() {
            if existing.is_running() {
                return Ok(existing.clone());
            }
            warn!(
                "Registered WebIO server on {} is no longer running, restarting",
                existing.local_addr()
            );
            *slot = None;
        }

        let process = Arc::new(ServerProcess::start(&self.config, handlers).await?);
        info!("Started singleton WebIO server on {}", process.local_addr());
        *slot = Some(process.clone());
        Ok(process)
    }

    /// The registered process, if any. No liveness check.
    pub async fn current(&self) -> Option<Arc<ServerProcess>> {
        self.slot.lock().await.clone()
    }

    /// Stop `process`, unregistering it if it is the singleton.
    ///
    /// Open WebSocket sessions keep running until their transport closes.
    pub async fn kill(&self, process: &ServerProcess) {
        {
            let mut slot = self.slot.lock().await;
            if slot
                .as_ref()
                .is_some_and(|registered| std::ptr::eq(Arc::as_ptr(registered), process))
            {
                *slot = None;
            }
        }
        process.stop().await;
    }

    /// Stop and unregister the singleton, if any.
    pub async fn shutdown(&self) {
        let registered = self.slot.lock().await.take();
        if let Some(process) = registered {
            process.stop().await;
        }
    }
}
