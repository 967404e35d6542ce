//! Adapters that detect failures and feed them to a [`CaptureEngine`].
//!
//! Each adapter does one thing: notice a failure, describe it as a [`CapturedEvent`], and call
//! [`CaptureEngine::capture`]. None of them mutate global state except through the host's own
//! extension points (the panic hook slot, a `tracing` subscriber layer, tower middleware).
//!
//! - [`log`]: `WARN`/`ERROR` tracing events → logged-warning / logged-error
//! - [`framework`]: errors handed to a host framework's error handler
//! - [`panic`]: panics → uncaught-exception
//! - [`task`]: failed background tasks → unhandled-rejection
//! - [`resource`]: resources that failed to load
//! - [`network`]: fetch-style middleware and transport lifecycle reporting
//!
//! [`CapturedEvent`]: crate::CapturedEvent

pub mod framework;
pub mod log;
pub mod network;
pub mod panic;
pub mod resource;
pub mod task;

use crate::config::CaptureConfig;
use crate::engine::CaptureEngine;
use crate::error::InstallError;

pub use self::log::CaptureLayer;
pub use framework::report_framework_error;
pub use network::{
    report_transport_error, report_transport_status, FetchCaptureLayer, FetchCaptureService,
    ResponseStatus, TransportRequest,
};
pub use panic::{install_panic_hook, PanicHookGuard, PANIC_QUEUE_CAPACITY};
pub use resource::{report_resource_error, ResourceKind};
pub use task::{report_rejection, spawn_reported};

/// Options for [`install`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Skip the startup banner.
    pub silent: bool,
}

impl From<&CaptureConfig> for InstallOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self { silent: config.silent }
    }
}

/// Handles produced by [`install`].
#[derive(Debug)]
pub struct Installation {
    /// Add this to your `tracing` subscriber to capture logged warnings and errors.
    pub layer: CaptureLayer,
    /// Restores the previous panic hook when [`PanicHookGuard::uninstall`] is called.
    pub panic_hook: PanicHookGuard,
}

/// Wire the process-level adapters to `engine`: installs the panic hook and returns the
/// logging layer for the caller's subscriber.
pub fn install(
    engine: &CaptureEngine,
    options: InstallOptions,
) -> Result<Installation, InstallError> {
    let panic_hook = install_panic_hook(engine.clone())?;
    if !(options.silent || engine.is_silent()) {
        tracing::info!(
            target: "caught::install",
            ttl_ms = engine.window().ttl().as_millis() as u64,
            "error capture started"
        );
    }
    Ok(Installation { layer: CaptureLayer::new(engine.clone()), panic_hook })
}
