//! Convenient re-exports for common capture types.
pub use crate::{
    adapters::{install, CaptureLayer, FetchCaptureLayer, InstallOptions},
    engine::{CaptureEngine, Dispatch},
    event::{CaptureKind, CapturedEvent},
    format::format_messages,
    observer::{Observer, SharedObserver, Subscription},
    payload::{ErrorDetails, PayloadValue},
    CaptureConfig, InstallError, ObserverError,
};
