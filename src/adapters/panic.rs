//! Uncaught-exception adapter built on the process panic hook.
//!
//! The hook itself only describes the panic and queues it. A dedicated delivery thread feeds
//! queued events to the engine, so observers never run while the panicking thread is still
//! handling its panic and an observer that panics is contained like any other.

use crate::engine::{is_dispatching, CaptureEngine};
use crate::error::{panic_message, InstallError};
use crate::event::{CaptureKind, CapturedEvent};
use crate::payload::{ErrorDetails, PayloadValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Panics queued for delivery beyond this are dropped and counted.
pub const PANIC_QUEUE_CAPACITY: usize = 1024;

type Restore = Box<dyn FnOnce() + Send>;

enum Delivery {
    Event(CapturedEvent),
    Flush(mpsc::Sender<()>),
    Stop,
}

/// Keeps the means to put the previous panic hook back and to wait for queued panics.
///
/// Dropping the guard leaves the capturing hook and its delivery thread running.
pub struct PanicHookGuard {
    restore: Option<Restore>,
    queue: SyncSender<Delivery>,
    worker: Option<JoinHandle<()>>,
    dropped: Arc<AtomicU64>,
}

impl std::fmt::Debug for PanicHookGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanicHookGuard")
            .field("installed", &self.restore.is_some())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl PanicHookGuard {
    /// Block until every panic queued so far has been handed to the engine.
    pub fn flush(&self) {
        let (ack, done) = mpsc::channel();
        if self.queue.send(Delivery::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Panics that could not be queued because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Put the previous hook back, deliver what is still queued, and stop the delivery thread.
    pub fn uninstall(self) {
        let PanicHookGuard { restore, queue, worker, .. } = self;
        if let Some(restore) = restore {
            restore();
        }
        if queue.send(Delivery::Stop).is_err() {
            return;
        }
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }
}

/// Report every panic to `engine` as an uncaught exception, then run the previously
/// installed hook.
///
/// Payload: `[message, file, line, column, error]`. Delivery is asynchronous; call
/// [`PanicHookGuard::flush`] to wait for it. A panic that ends the process may exit before its
/// event is delivered. Panics raised inside [`CaptureEngine::capture`] (observers, sinks,
/// serializers) are passed straight to the previous hook.
pub fn install_panic_hook(engine: CaptureEngine) -> Result<PanicHookGuard, InstallError> {
    let (queue, pending) = mpsc::sync_channel(PANIC_QUEUE_CAPACITY);
    let worker = std::thread::Builder::new()
        .name("caught-panic-delivery".to_string())
        .spawn(move || deliver(engine, pending))?;

    let dropped = Arc::new(AtomicU64::new(0));
    let previous = Arc::new(std::panic::take_hook());
    let chained = Arc::clone(&previous);
    let hook_queue = queue.clone();
    let hook_dropped = Arc::clone(&dropped);

    std::panic::set_hook(Box::new(move |info| {
        if !is_dispatching() {
            let message = panic_message(info.payload());
            let (file, line, column) = match info.location() {
                Some(location) => (
                    PayloadValue::from(location.file()),
                    PayloadValue::from(location.line()),
                    PayloadValue::from(location.column()),
                ),
                None => (PayloadValue::Null, PayloadValue::Null, PayloadValue::Null),
            };
            let details = ErrorDetails::new("panic", message.clone()).with_backtrace();
            let event = CapturedEvent::new(
                CaptureKind::UncaughtException,
                vec![PayloadValue::from(message), file, line, column, details.into()],
            );
            if hook_queue.try_send(Delivery::Event(event)).is_err() {
                hook_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        chained(info);
    }));

    let restore: Restore = Box::new(move || {
        let _ours = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| previous(info)));
    });
    Ok(PanicHookGuard { restore: Some(restore), queue, worker: Some(worker), dropped })
}

fn deliver(engine: CaptureEngine, pending: Receiver<Delivery>) {
    for delivery in pending {
        match delivery {
            Delivery::Event(event) => {
                engine.capture(event);
            }
            Delivery::Flush(ack) => {
                let _ = ack.send(());
            }
            Delivery::Stop => break,
        }
    }
    tracing::debug!(target: "caught::panic", "panic delivery stopped");
}
