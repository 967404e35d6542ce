//! The capture engine: the single ingestion entry point.
//!
//! Semantics:
//! - `capture` fingerprints the event, consults the [`DedupWindow`], and drops suppressed
//!   occurrences without side effects.
//! - Admitted events go to every subscribed observer, or to the default sink when nobody is
//!   subscribed.
//! - `capture` never panics outward and never returns an error; observer and sink failures
//!   are contained, logged, and counted.
//!
//! Example
//! ```rust
//! use caught::{CaptureEngine, CaptureKind, CapturedEvent, Dispatch};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let engine = CaptureEngine::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = seen.clone();
//! let _subscription = engine.observe(move |_event: &CapturedEvent| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! for _ in 0..3 {
//!     engine.capture(CapturedEvent::new(CaptureKind::LoggedError, ["boom"]));
//! }
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! assert_eq!(engine.stats().suppressed, 2);
//! ```

use crate::clock::{Clock, MonotonicClock};
use crate::config::{validate_ttl, CaptureConfig};
use crate::dedup::{DedupWindow, DEFAULT_TTL};
use crate::error::{panic_message, ConfigError};
use crate::event::CapturedEvent;
use crate::observer::{BroadcastReport, ObserverRegistry, SharedObserver, Subscription};
use crate::sink::{DefaultSink, LogSink};
use crate::sleeper::{Sleeper, TokioSleeper};
use std::cell::Cell;
use std::convert::Infallible;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

thread_local! {
    static DISPATCHING: Cell<bool> = Cell::new(false);
}

/// Whether the current thread is inside [`CaptureEngine::capture`].
///
/// Adapters use this to ignore failures raised by observers, sinks, clocks, or serializers
/// while the engine is handling another event.
pub fn is_dispatching() -> bool {
    DISPATCHING.with(Cell::get)
}

struct DispatchGuard {
    previous: bool,
}

impl DispatchGuard {
    fn enter() -> Self {
        Self { previous: DISPATCHING.with(|flag| flag.replace(true)) }
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        DISPATCHING.with(|flag| flag.set(previous));
    }
}

/// What `capture` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A duplicate inside the suppression window; nothing was notified.
    Suppressed,
    /// The event carried no payload and was dropped before deduplication.
    Discarded,
    /// Delivered to the subscribed observers.
    Broadcast(BroadcastReport),
    /// No observer was subscribed; written to the default sink.
    DefaultSink,
}

impl Dispatch {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Dispatch::Broadcast(_) | Dispatch::DefaultSink)
    }
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub captured: u64,
    pub admitted: u64,
    pub suppressed: u64,
    pub discarded: u64,
    pub broadcasts: u64,
    pub observer_failures: u64,
    pub sink_writes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    captured: AtomicU64,
    admitted: AtomicU64,
    suppressed: AtomicU64,
    discarded: AtomicU64,
    broadcasts: AtomicU64,
    observer_failures: AtomicU64,
    sink_writes: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            captured: self.captured.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            observer_failures: self.observer_failures.load(Ordering::Relaxed),
            sink_writes: self.sink_writes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct EngineInner {
    window: DedupWindow,
    observers: ObserverRegistry,
    default_sink: Arc<dyn DefaultSink>,
    counters: Counters,
    silent: bool,
}

/// Normalization, deduplication, and dispatch engine.
///
/// Clones share the same suppression set, observers, and counters; hand clones to adapters.
#[derive(Debug, Clone)]
pub struct CaptureEngine {
    inner: Arc<EngineInner>,
}

impl Default for CaptureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureEngine {
    /// Engine with the default 3s window, tokio timers, and a `tracing` default sink.
    pub fn new() -> Self {
        Self::builder().build_unchecked()
    }

    pub fn builder() -> CaptureEngineBuilder {
        CaptureEngineBuilder::new()
    }

    /// Build from validated configuration.
    pub fn from_config(config: &CaptureConfig) -> Result<Self, ConfigError> {
        Self::builder().ttl(config.ttl()).silent(config.silent).build()
    }

    /// Ingest one event. Never panics outward.
    ///
    /// Events with an empty payload are discarded; adapters always describe what failed.
    pub fn capture(&self, event: CapturedEvent) -> Dispatch {
        let _guard = DispatchGuard::enter();
        let inner = &self.inner;
        inner.counters.captured.fetch_add(1, Ordering::Relaxed);

        if event.payload.is_empty() {
            inner.counters.discarded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(target: "caught::engine", kind = %event.kind, "discarded empty event");
            return Dispatch::Discarded;
        }

        let fingerprint = event.fingerprint();
        if !inner.window.should_admit(&fingerprint) {
            inner.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            return Dispatch::Suppressed;
        }
        inner.counters.admitted.fetch_add(1, Ordering::Relaxed);

        if inner.observers.is_empty() {
            self.write_default(&event);
            return Dispatch::DefaultSink;
        }

        let report = inner.observers.broadcast(&event);
        if report.delivered + report.failed == 0 {
            // every observer left between the emptiness check and the snapshot
            self.write_default(&event);
            return Dispatch::DefaultSink;
        }
        inner.counters.broadcasts.fetch_add(1, Ordering::Relaxed);
        inner.counters.observer_failures.fetch_add(report.failed as u64, Ordering::Relaxed);
        Dispatch::Broadcast(report)
    }

    /// Subscribe an observer; the same `Arc` registers once.
    pub fn subscribe(&self, observer: SharedObserver) -> Subscription {
        self.inner.observers.subscribe(observer)
    }

    /// Subscribe a closure.
    pub fn observe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CapturedEvent) + Send + Sync + 'static,
    {
        self.inner.observers.observe(callback)
    }

    /// Remove an observer; a no-op when it is not registered.
    pub fn unsubscribe(&self, observer: &SharedObserver) -> bool {
        self.inner.observers.unsubscribe(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    /// The suppression window backing this engine.
    pub fn window(&self) -> &DedupWindow {
        &self.inner.window
    }

    pub fn stats(&self) -> CaptureStats {
        self.inner.counters.snapshot()
    }

    pub fn is_silent(&self) -> bool {
        self.inner.silent
    }

    fn write_default(&self, event: &CapturedEvent) {
        let sink = &self.inner.default_sink;
        match catch_unwind(AssertUnwindSafe(|| sink.write(event))) {
            Ok(()) => {
                self.inner.counters.sink_writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(panic) => {
                tracing::warn!(
                    target: "caught::engine",
                    kind = %event.kind,
                    panic = %panic_message(panic.as_ref()),
                    "default sink panicked"
                );
            }
        }
    }
}

impl tower_service::Service<CapturedEvent> for CaptureEngine {
    type Response = Dispatch;
    type Error = Infallible;
    type Future = futures::future::Ready<Result<Dispatch, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: CapturedEvent) -> Self::Future {
        futures::future::ready(Ok(self.capture(event)))
    }
}

/// Builder for [`CaptureEngine`].
#[derive(Debug)]
pub struct CaptureEngineBuilder {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    default_sink: Arc<dyn DefaultSink>,
    silent: bool,
}

impl Default for CaptureEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureEngineBuilder {
    pub fn new() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            clock: Arc::new(MonotonicClock::default()),
            sleeper: Arc::new(TokioSleeper),
            default_sink: Arc::new(LogSink),
            silent: false,
        }
    }

    /// Suppression window per fingerprint. Must be > 0 and <= [`MAX_TTL`](crate::MAX_TTL).
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the clock (useful for deterministic tests).
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Override how expiry tasks wait out the TTL.
    pub fn sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Replace the fallback used when no observer is subscribed.
    pub fn default_sink<D: DefaultSink + 'static>(mut self, sink: D) -> Self {
        self.default_sink = Arc::new(sink);
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn build(self) -> Result<CaptureEngine, ConfigError> {
        validate_ttl(self.ttl)?;
        Ok(self.build_unchecked())
    }

    fn build_unchecked(self) -> CaptureEngine {
        CaptureEngine {
            inner: Arc::new(EngineInner {
                window: DedupWindow::with_shared(self.ttl, self.clock, self.sleeper),
                observers: ObserverRegistry::new(),
                default_sink: self.default_sink,
                counters: Counters::default(),
                silent: self.silent,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::event::CaptureKind;
    use crate::payload::PayloadValue;
    use crate::sink::MemorySink;
    use std::sync::atomic::AtomicUsize;

    fn engine_with(clock: &ManualClock, sink: &MemorySink) -> CaptureEngine {
        CaptureEngine::builder()
            .ttl(Duration::from_millis(3000))
            .clock(clock.clone())
            .default_sink(sink.clone())
            .build()
            .expect("valid engine")
    }

    fn boom() -> CapturedEvent {
        CapturedEvent::new(CaptureKind::LoggedError, ["boom"])
    }

    #[test]
    fn rejects_zero_ttl() {
        let err = CaptureEngine::builder().ttl(Duration::ZERO).build().expect_err("invalid");
        assert!(matches!(err, ConfigError::InvalidTtl { .. }));
    }

    #[test]
    fn suppressed_events_touch_nothing() {
        let clock = ManualClock::new();
        let sink = MemorySink::new();
        let engine = engine_with(&clock, &sink);

        assert_eq!(engine.capture(boom()), Dispatch::DefaultSink);
        assert_eq!(engine.capture(boom()), Dispatch::Suppressed);
        assert_eq!(sink.len(), 1);

        let stats = engine.stats();
        assert_eq!(stats.captured, 2);
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.suppressed, 1);
        assert_eq!(stats.sink_writes, 1);
    }

    #[test]
    fn observers_replace_default_sink() {
        let clock = ManualClock::new();
        let sink = MemorySink::new();
        let engine = engine_with(&clock, &sink);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let subscription = engine.observe(move |_: &CapturedEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = engine.capture(boom());
        assert_eq!(outcome, Dispatch::Broadcast(BroadcastReport { delivered: 1, failed: 0 }));
        assert!(sink.is_empty());

        subscription.unsubscribe();
        clock.advance(3000);
        assert_eq!(engine.capture(boom()), Dispatch::DefaultSink);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn dispatch_marker_is_set_only_during_delivery() {
        let engine = CaptureEngine::builder().default_sink(MemorySink::new()).build().unwrap();
        let observed = Arc::new(AtomicUsize::new(0));
        let flag = observed.clone();
        let _sub = engine.observe(move |_: &CapturedEvent| {
            if is_dispatching() {
                flag.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(!is_dispatching());
        engine.capture(boom());
        assert!(!is_dispatching());
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_payload_is_discarded() {
        let clock = ManualClock::new();
        let sink = MemorySink::new();
        let engine = engine_with(&clock, &sink);

        let empty = CapturedEvent::new(CaptureKind::LoggedError, Vec::<PayloadValue>::new());
        assert_eq!(engine.capture(empty.clone()), Dispatch::Discarded);
        assert!(!Dispatch::Discarded.is_admitted());
        assert_eq!(engine.capture(empty), Dispatch::Discarded);

        assert!(sink.is_empty());
        assert!(engine.window().is_empty());
        let stats = engine.stats();
        assert_eq!(stats.captured, 2);
        assert_eq!(stats.discarded, 2);
        assert_eq!(stats.admitted, 0);
    }

    #[test]
    fn dispatch_marker_covers_fingerprinting() {
        #[derive(Debug)]
        struct Probing(Arc<AtomicUsize>);
        impl crate::payload::StructuredValue for Probing {
            fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
                if is_dispatching() {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
                Ok(serde_json::Value::Null)
            }
        }

        let seen = Arc::new(AtomicUsize::new(0));
        let engine = CaptureEngine::builder().default_sink(MemorySink::new()).build().unwrap();
        engine.capture(CapturedEvent::new(
            CaptureKind::LoggedError,
            vec![PayloadValue::Structured(Arc::new(Probing(seen.clone())))],
        ));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!is_dispatching());
    }

    #[test]
    fn panicking_default_sink_is_contained() {
        #[derive(Debug)]
        struct Exploding;
        impl DefaultSink for Exploding {
            fn write(&self, _event: &CapturedEvent) {
                panic!("sink exploded");
            }
        }

        let engine = CaptureEngine::builder().default_sink(Exploding).build().unwrap();
        assert_eq!(engine.capture(boom()), Dispatch::DefaultSink);
        assert_eq!(engine.stats().sink_writes, 0);
        assert!(!is_dispatching());
    }

    #[test]
    fn clones_share_state() {
        let sink = MemorySink::new();
        let engine = CaptureEngine::builder().default_sink(sink.clone()).build().unwrap();
        let adapter_handle = engine.clone();

        engine.capture(boom());
        assert_eq!(adapter_handle.capture(boom()), Dispatch::Suppressed);
        assert_eq!(adapter_handle.stats().captured, 2);
    }

    #[test]
    fn from_config_applies_ttl_and_silence() {
        let config = CaptureConfig { ttl_ms: 250, silent: true };
        let engine = CaptureEngine::from_config(&config).unwrap();
        assert_eq!(engine.window().ttl(), Duration::from_millis(250));
        assert!(engine.is_silent());
    }

    #[tokio::test]
    async fn engine_is_a_tower_service() {
        use tower::ServiceExt;

        let sink = MemorySink::new();
        let engine = CaptureEngine::builder().default_sink(sink.clone()).build().unwrap();

        let first = engine.clone().oneshot(boom()).await.unwrap();
        let second = engine.clone().oneshot(boom()).await.unwrap();
        assert_eq!(first, Dispatch::DefaultSink);
        assert_eq!(second, Dispatch::Suppressed);
        assert_eq!(sink.len(), 1);
    }
}
