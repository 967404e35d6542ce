//! Default sinks used when no observer is subscribed.
//!
//! The default sink is a diagnostic fallback so admitted failures are never silently dropped
//! before a consumer is wired up. It is not an output contract.

use crate::event::CapturedEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fallback destination for admitted events.
pub trait DefaultSink: Send + Sync + std::fmt::Debug {
    fn write(&self, event: &CapturedEvent);
}

/// A sink that discards all events.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl DefaultSink for NullSink {
    fn write(&self, _event: &CapturedEvent) {}
}

/// A sink that logs events using the `tracing` crate at `info` level.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl DefaultSink for LogSink {
    fn write(&self, event: &CapturedEvent) {
        tracing::info!(
            target: "caught::captured",
            kind = %event.kind,
            timestamp_ms = event.timestamp_millis(),
            "[Captured] {}",
            event
        );
    }
}

/// A sink that stores events in memory, evicting the oldest beyond its capacity.
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultSink for MemorySink {
    fn write(&self, event: &CapturedEvent) {
        let mut guard = self.lock();
        if guard.len() >= self.capacity {
            guard.remove(0);
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push(event.clone());
    }
}
