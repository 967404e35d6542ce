#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # caught
//!
//! Runtime failure capture for Rust: normalize heterogeneous failure signals into one event
//! shape, suppress duplicate bursts, and fan the survivors out to observers.
//!
//! ## Features
//!
//! - **One ingestion entry point**: [`CaptureEngine::capture`] never panics outward
//! - **Duplicate suppression** per fingerprint with a self-expiring TTL window
//! - **Isolated broadcast**: a failing observer never blocks the others
//! - **Default sink** so failures are logged even before anyone subscribes
//! - **Formatter** turning arbitrary payloads into readable text
//! - **Adapters** for `tracing` warnings/errors, panics, failed tasks, tower services,
//!   resource loads, and framework error handlers
//!
//! ## Quick Start
//!
//! ```rust
//! use caught::{CaptureEngine, CaptureKind, CapturedEvent};
//! use std::time::Duration;
//!
//! let engine = CaptureEngine::builder()
//!     .ttl(Duration::from_secs(3))
//!     .build()
//!     .unwrap();
//!
//! let _subscription = engine.observe(|event: &CapturedEvent| {
//!     eprintln!("{}", event);
//! });
//!
//! engine.capture(CapturedEvent::new(CaptureKind::LoggedError, ["boom"]));
//! // suppressed: same kind and payload inside the window
//! engine.capture(CapturedEvent::new(CaptureKind::LoggedError, ["boom"]));
//! assert_eq!(engine.stats().admitted, 1);
//! ```

pub mod adapters;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod event;
pub mod format;
pub mod observer;
pub mod payload;
pub mod prelude;
pub mod sink;
pub mod sleeper;

// Re-exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::CaptureConfig;
pub use dedup::{DedupWindow, DEFAULT_TTL};
pub use engine::{is_dispatching, CaptureEngine, CaptureEngineBuilder, CaptureStats, Dispatch};
pub use error::{ConfigError, InstallError, ObserverError, MAX_TTL};
pub use event::{CaptureKind, CapturedEvent};
pub use format::{format_messages, format_value};
pub use observer::{BroadcastReport, Observer, ObserverRegistry, SharedObserver, Subscription};
pub use payload::{ErrorDetails, PayloadValue, StructuredValue};
pub use sink::{DefaultSink, LogSink, MemorySink, NullSink};
pub use sleeper::{Sleeper, TokioSleeper, TrackingSleeper};
