//! Unhandled-rejection adapter for background tasks.

use crate::engine::{CaptureEngine, Dispatch};
use crate::event::{CaptureKind, CapturedEvent};
use crate::payload::PayloadValue;
use std::future::Future;
use tokio::task::JoinHandle;

/// Report the error a background task ended with when nobody is awaiting it.
///
/// Payload: `[reason]`.
pub fn report_rejection<E>(engine: &CaptureEngine, reason: &E) -> Dispatch
where
    E: std::error::Error + ?Sized,
{
    engine.capture(CapturedEvent::new(
        CaptureKind::UnhandledRejection,
        vec![PayloadValue::error(reason)],
    ))
}

/// Spawn a fallible task whose error is reported instead of silently dropped.
///
/// The handle yields `Some(value)` on success and `None` when the task failed (the failure has
/// already been reported). Panics inside the task are left to the panic hook.
pub fn spawn_reported<F, T, E>(engine: &CaptureEngine, future: F) -> JoinHandle<Option<T>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + 'static,
{
    let engine = engine.clone();
    tokio::spawn(async move {
        match future.await {
            Ok(value) => Some(value),
            Err(reason) => {
                report_rejection(&engine, &reason);
                None
            }
        }
    })
}
