//! The panic hook is process-global, so everything touching it lives in one test.

use caught::adapters::install_panic_hook;
use caught::{CaptureEngine, CaptureKind, CapturedEvent, MemorySink};
use std::panic::catch_unwind;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn panics_are_captured_until_the_hook_is_uninstalled() {
    let sink = MemorySink::new();
    let engine = CaptureEngine::builder().default_sink(sink.clone()).build().unwrap();
    let guard = install_panic_hook(engine.clone()).unwrap();

    let result = catch_unwind(|| panic!("kaboom"));
    assert!(result.is_err());
    guard.flush();

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, CaptureKind::UncaughtException);
    let rendered = events[0].formatted();
    assert!(rendered.starts_with("kaboom\n"), "{rendered}");
    assert!(rendered.contains("panic_hook.rs"), "{rendered}");
    assert!(rendered.contains("Message:kaboom"), "{rendered}");

    // same message from another line is a distinct fingerprint
    let _ = catch_unwind(|| panic!("kaboom"));
    guard.flush();
    assert_eq!(engine.stats().suppressed, 0);
    assert_eq!(sink.len(), 2);

    // an observer that panics while a panic is being reported is contained
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let record = delivered.clone();
    let exploding = engine.observe(|_: &CapturedEvent| panic!("observer exploded"));
    let counting = engine.observe(move |event: &CapturedEvent| {
        record.lock().unwrap().push(event.kind);
    });
    let _ = catch_unwind(|| panic!("app panic"));
    guard.flush();

    assert_eq!(*delivered.lock().unwrap(), vec![CaptureKind::UncaughtException]);
    let stats = engine.stats();
    assert_eq!(stats.observer_failures, 1);
    assert_eq!(stats.captured, 3, "observer panics are not recaptured");
    exploding.unsubscribe();
    counting.unsubscribe();

    // delivery keeps working after an observer panicked on the delivery thread
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let watcher = engine.observe(move |_: &CapturedEvent| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let _ = catch_unwind(|| panic!("after observers"));
    guard.flush();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    watcher.unsubscribe();

    assert_eq!(guard.dropped(), 0);
    guard.uninstall();
    let _ = catch_unwind(|| panic!("after uninstall"));
    assert_eq!(engine.stats().captured, 4);
    assert_eq!(sink.len(), 2);
}
