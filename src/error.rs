//! Error types for the capture engine
//!
//! None of these ever escape [`CaptureEngine::capture`](crate::CaptureEngine::capture); they
//! describe configuration problems and observer failures that are reported, counted, and
//! swallowed.

use std::any::Any;
use std::time::Duration;

/// Upper bound accepted for the suppression TTL.
pub const MAX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors produced while validating or loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// TTL must be > 0 and no larger than [`MAX_TTL`].
    #[error("ttl must be > 0 and <= {max:?} (got {ttl:?})", max = MAX_TTL)]
    InvalidTtl {
        /// Value provided by caller.
        ttl: Duration,
    },
    /// The configuration document could not be parsed.
    #[error("invalid capture config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors produced while installing process-level adapters.
#[derive(thiserror::Error, Debug)]
pub enum InstallError {
    /// The thread that delivers captured panics could not be started.
    #[error("failed to start panic delivery thread: {0}")]
    DeliveryThread(#[from] std::io::Error),
}

/// Failure reported by an observer while handling an event.
#[derive(thiserror::Error, Debug)]
#[error("observer failed: {source}")]
pub struct ObserverError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl ObserverError {
    /// Wrap any error (or string) as an observer failure.
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self { source: source.into() }
    }
}

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
