//! Captured events and their fingerprints.

use crate::format::format_messages;
use crate::payload::PayloadValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source category of a captured failure. Closed set; adapters map onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureKind {
    /// A warning written through the logging facade.
    LoggedWarning,
    /// An error written through the logging facade.
    LoggedError,
    /// An error handed to a host framework's error handler.
    FrameworkError,
    /// A failure nothing caught (a panic).
    UncaughtException,
    /// An asynchronous task that failed with nobody awaiting its error.
    UnhandledRejection,
    /// A resource (script, stylesheet, image) that failed to load.
    ResourceLoadError,
    /// A fetch-style request that failed or returned a non-success status.
    NetworkFetchError,
    /// A request/response transport that errored or returned status >= 400.
    NetworkTransportError,
}

impl CaptureKind {
    /// Every kind, in declaration order.
    pub const ALL: [CaptureKind; 8] = [
        CaptureKind::LoggedWarning,
        CaptureKind::LoggedError,
        CaptureKind::FrameworkError,
        CaptureKind::UncaughtException,
        CaptureKind::UnhandledRejection,
        CaptureKind::ResourceLoadError,
        CaptureKind::NetworkFetchError,
        CaptureKind::NetworkTransportError,
    ];

    /// Stable label used in fingerprints and log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureKind::LoggedWarning => "logged-warning",
            CaptureKind::LoggedError => "logged-error",
            CaptureKind::FrameworkError => "framework-error",
            CaptureKind::UncaughtException => "uncaught-exception",
            CaptureKind::UnhandledRejection => "unhandled-rejection",
            CaptureKind::ResourceLoadError => "resource-load-error",
            CaptureKind::NetworkFetchError => "network-fetch-error",
            CaptureKind::NetworkTransportError => "network-transport-error",
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical unit flowing through the engine.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub kind: CaptureKind,
    /// Ordered description of the failure; order is significant.
    pub payload: Vec<PayloadValue>,
    pub timestamp: SystemTime,
}

impl CapturedEvent {
    /// Build an event stamped with the current wall-clock time.
    pub fn new<I, V>(kind: CaptureKind, payload: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PayloadValue>,
    {
        Self::at(kind, payload, SystemTime::now())
    }

    /// Build an event with an explicit timestamp.
    pub fn at<I, V>(kind: CaptureKind, payload: I, timestamp: SystemTime) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PayloadValue>,
    {
        Self { kind, payload: payload.into_iter().map(Into::into).collect(), timestamp }
    }

    /// Milliseconds since the Unix epoch (0 for timestamps before it).
    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    /// Deduplication key: the kind label plus a compact serialization of the payload.
    ///
    /// Independent of `timestamp`. Always produces a string: each element that refuses to
    /// serialize, or panics while serializing, is replaced by its default string conversion on
    /// its own, so the rest of the payload still tells events apart.
    pub fn fingerprint(&self) -> String {
        let body = Value::Array(self.payload.iter().map(PayloadValue::to_json_lossy).collect());
        format!("{}:{}", self.kind.as_str(), body)
    }

    /// Human-readable rendering of the payload.
    pub fn formatted(&self) -> String {
        format_messages(&self.payload)
    }
}

impl fmt::Display for CapturedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.formatted())
    }
}
