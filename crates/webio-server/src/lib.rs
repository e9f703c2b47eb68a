//! WebIO Server: singleton lifecycle and the display entry point.
//!
//! [`ServerRegistry`] owns at most one running
//! [`ServerProcess`](webio_transport::ServerProcess) in singleton mode.
//! [`WebIo::show_application`] ensures that process is running and emits
//! the bootstrap scripts plus a hydration fragment for a UI node.

pub mod display;
pub mod error;
pub mod registry;
pub mod render;

pub use display::{BootstrapAssets, WebIo};
pub use error::WebIoError;
pub use registry::{ServerRegistry, StartMode, global_config};
pub use render::{MountFragment, Render, render_fragment};
