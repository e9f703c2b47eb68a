//! Errors surfaced by the display entry point.

use thiserror::Error;
use webio_protocol::ConfigError;
use webio_transport::{AssetError, ServerError};

#[derive(Debug, Error)]
pub enum WebIoError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("server failed to start: {0}")]
    Server(#[from] ServerError),

    #[error("bootstrap asset unavailable: {0}")]
    Asset(#[from] AssetError),

    #[error("failed to write markup")]
    Write(#[from] std::fmt::Error),
}
