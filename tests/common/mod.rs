#![allow(dead_code)]

use caught::{CaptureEngine, CapturedEvent, ManualClock, MemorySink, SharedObserver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TTL_MS: u64 = 3000;

/// Engine on a manual clock that writes fallback events into memory.
pub fn manual_engine() -> (CaptureEngine, ManualClock, MemorySink) {
    let clock = ManualClock::new();
    let sink = MemorySink::new();
    let engine = CaptureEngine::builder()
        .ttl(Duration::from_millis(TTL_MS))
        .clock(clock.clone())
        .default_sink(sink.clone())
        .build()
        .expect("valid engine");
    (engine, clock, sink)
}

/// Observer that records the formatted payload of every event it sees.
pub fn recorder() -> (Arc<Mutex<Vec<String>>>, SharedObserver) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let inner = seen.clone();
    let observer: SharedObserver = Arc::new(move |event: &CapturedEvent| {
        inner.lock().unwrap().push(event.formatted());
    });
    (seen, observer)
}
