//! Server configuration.
//!
//! Resolved from environment-like key/value sources with documented
//! defaults. Resolution is pure over its lookup function so callers (and
//! tests) can inject any source; memoization lives with the registry that
//! owns the process-wide value.

use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8081;
pub const DEFAULT_WS_ROUTE: &str = "/webio_websocket/";

/// Environment keys read during resolution.
pub struct ConfigKeys;

impl ConfigKeys {
    pub const HOST: &str = "WEBIO_SERVER_HOST_URL";
    pub const HTTP_PORT: &str = "WEBIO_HTTP_PORT";
    pub const WS_ROUTE: &str = "WEBIO_WEBSOCKET_ROUTE";
    pub const WS_URL: &str = "WEBIO_WEBSOCKET_URL";
    pub const BASE_URL: &str = "WEBIO_BASE_URL";
}

/// Where the server binds and how browsers reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Hostname or IP to bind to
    pub host: String,
    /// HTTP port (0 for OS-assigned)
    pub http_port: u16,
    /// Path on which WebSocket upgrades are accepted
    pub ws_route: String,
    /// URL the browser connects its WebSocket to
    pub ws_url: String,
    /// Prefix prepended to asset tokens when emitting `<script src>`
    pub asset_base_url: String,
    /// Attach a permissive CORS layer to HTTP responses
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_HTTP_PORT)
    }
}

impl ServerConfig {
    /// Build a configuration with derived URLs for `host:port`.
    pub fn new(host: impl Into<String>, http_port: u16) -> Self {
        let host = host.into();
        Self {
            ws_url: default_ws_url(&host, http_port, DEFAULT_WS_ROUTE),
            asset_base_url: default_base_url(&host, http_port),
            host,
            http_port,
            ws_route: DEFAULT_WS_ROUTE.to_string(),
            enable_cors: false,
        }
    }

    /// Change the WebSocket route, re-deriving the WebSocket URL unless it
    /// was set explicitly.
    pub fn with_ws_route(mut self, route: impl Into<String>) -> Result<Self, ConfigError> {
        let route = route.into();
        validate_route(&route)?;
        let (host, port) = (self.host.clone(), self.http_port);
        self.rebase(host, port, route);
        Ok(self)
    }

    /// Change the bind address, re-deriving whichever URLs were not set
    /// explicitly.
    pub fn with_address(mut self, host: impl Into<String>, http_port: u16) -> Result<Self, ConfigError> {
        let host = host.into();
        validate_host(&host)?;
        let route = self.ws_route.clone();
        self.rebase(host, http_port, route);
        Ok(self)
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Re-derive both URLs for a port chosen after resolution (e.g. an
    /// OS-assigned one), leaving explicit overrides of other hosts alone.
    pub fn with_bound_port(mut self, port: u16) -> Self {
        let (host, route) = (self.host.clone(), self.ws_route.clone());
        self.rebase(host, port, route);
        self
    }

    fn rebase(&mut self, host: String, http_port: u16, ws_route: String) {
        if self.ws_url == default_ws_url(&self.host, self.http_port, &self.ws_route) {
            self.ws_url = default_ws_url(&host, http_port, &ws_route);
        }
        if self.asset_base_url == default_base_url(&self.host, self.http_port) {
            self.asset_base_url = default_base_url(&host, http_port);
        }
        self.host = host;
        self.http_port = http_port;
        self.ws_route = ws_route;
    }

    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key/value source.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get(ConfigKeys::HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        validate_host(&host)?;

        let http_port = match get(ConfigKeys::HTTP_PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                key: ConfigKeys::HTTP_PORT,
                value: raw,
            })?,
            None => DEFAULT_HTTP_PORT,
        };

        let ws_route = get(ConfigKeys::WS_ROUTE).unwrap_or_else(|| DEFAULT_WS_ROUTE.to_string());
        validate_route(&ws_route)?;

        let ws_url = get(ConfigKeys::WS_URL)
            .unwrap_or_else(|| default_ws_url(&host, http_port, &ws_route));
        let asset_base_url = get(ConfigKeys::BASE_URL)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| default_base_url(&host, http_port));

        Ok(Self {
            host,
            http_port,
            ws_route,
            ws_url,
            asset_base_url,
            enable_cors: false,
        })
    }

    /// Check a configuration built or edited by hand.
    ///
    /// Resolution through [`from_lookup`](Self::from_lookup) or the builder
    /// already guarantees this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_host(&self.host)?;
        validate_route(&self.ws_route)
    }

    /// `host:port` suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// Absolute URL for an asset token (which starts with `/`).
    pub fn asset_url(&self, token: &str) -> String {
        format!("{}{}", self.asset_base_url, token)
    }
}

fn default_ws_url(host: &str, port: u16, route: &str) -> String {
    format!("ws://{host}:{port}{route}")
}

fn default_base_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}

/// A route must be a literal absolute path other than `/`, which belongs to
/// the page handler. Capture and wildcard syntax is rejected because the
/// router treats it as a pattern.
fn validate_route(route: &str) -> Result<(), ConfigError> {
    let literal = route.starts_with('/')
        && route != "/"
        && !route.chars().any(|c| c.is_whitespace() || c == '{' || c == '}')
        && !route
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'));
    if !literal {
        return Err(ConfigError::InvalidRoute(route.to_string()));
    }
    Ok(())
}

fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ConfigError::InvalidHost(host.to_string()));
    }
    Ok(())
}
