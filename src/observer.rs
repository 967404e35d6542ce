//! Observer registry and isolated broadcast.
//!
//! Observers are held as `Arc<dyn Observer>` and compared by identity, so registering the
//! same `Arc` twice keeps one entry. The set is copy-on-write (`ArcSwap`): a broadcast walks
//! the snapshot taken when it started, and observers that subscribe or unsubscribe from inside
//! a callback only affect later broadcasts.

use crate::error::{panic_message, ObserverError};
use crate::event::CapturedEvent;
use arc_swap::ArcSwap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

/// A consumer of admitted events.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &CapturedEvent) -> Result<(), ObserverError>;
}

impl<F> Observer for F
where
    F: Fn(&CapturedEvent) + Send + Sync,
{
    fn on_event(&self, event: &CapturedEvent) -> Result<(), ObserverError> {
        self(event);
        Ok(())
    }
}

/// Shared observer handle; identity is the allocation it points to.
pub type SharedObserver = Arc<dyn Observer>;

type ObserverList = ArcSwap<Vec<SharedObserver>>;

fn same_observer(a: &SharedObserver, b: &SharedObserver) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Observers that returned normally.
    pub delivered: usize,
    /// Observers that returned an error or panicked.
    pub failed: usize,
}

/// Set of registered observers.
///
/// Clones share the same set.
#[derive(Clone)]
pub struct ObserverRegistry {
    observers: Arc<ObserverList>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry").field("observers", &self.len()).finish()
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self { observers: Arc::new(ArcSwap::from_pointee(Vec::new())) }
    }

    /// Register `observer` unless that same observer is already present.
    pub fn subscribe(&self, observer: SharedObserver) -> Subscription {
        self.observers.rcu(|current| {
            if current.iter().any(|held| same_observer(held, &observer)) {
                Arc::clone(current)
            } else {
                let mut next = Vec::with_capacity(current.len() + 1);
                next.extend(current.iter().cloned());
                next.push(Arc::clone(&observer));
                Arc::new(next)
            }
        });
        Subscription { observers: Arc::downgrade(&self.observers), observer }
    }

    /// Register a closure.
    pub fn observe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CapturedEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(callback))
    }

    /// Remove `observer`. Returns whether it was registered; removing an absent observer is a
    /// no-op.
    pub fn unsubscribe(&self, observer: &SharedObserver) -> bool {
        remove_observer(&self.observers, observer)
    }

    pub fn len(&self) -> usize {
        self.observers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.load().is_empty()
    }

    /// Deliver `event` to every observer registered when the call starts.
    ///
    /// Each delivery is isolated: an observer that errors or panics is logged and counted,
    /// and the remaining observers still run.
    pub fn broadcast(&self, event: &CapturedEvent) -> BroadcastReport {
        let snapshot = self.observers.load_full();
        let mut report = BroadcastReport::default();

        for (index, observer) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| observer.on_event(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    tracing::warn!(
                        target: "caught::observer",
                        observer = index,
                        kind = %event.kind,
                        error = %err,
                        "observer returned an error"
                    );
                }
                Err(panic) => {
                    report.failed += 1;
                    tracing::warn!(
                        target: "caught::observer",
                        observer = index,
                        kind = %event.kind,
                        panic = %panic_message(panic.as_ref()),
                        "observer panicked"
                    );
                }
            }
        }
        report
    }
}

fn remove_observer(observers: &ObserverList, observer: &SharedObserver) -> bool {
    let previous = observers.rcu(|current| {
        if current.iter().any(|held| same_observer(held, observer)) {
            Arc::new(
                current.iter().filter(|held| !same_observer(held, observer)).cloned().collect(),
            )
        } else {
            Arc::clone(current)
        }
    });
    previous.iter().any(|held| same_observer(held, observer))
}

/// Handle returned by [`ObserverRegistry::subscribe`]; removes exactly that observer.
///
/// Dropping the handle does not unsubscribe. The handle holds the registry weakly, so it never
/// keeps the registry alive.
#[must_use = "keep the subscription to be able to unsubscribe later"]
pub struct Subscription {
    observers: Weak<ObserverList>,
    observer: SharedObserver,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.is_active()).finish()
    }
}

impl Subscription {
    /// Remove the observer. Safe to call repeatedly; returns whether this call removed it.
    pub fn unsubscribe(&self) -> bool {
        match self.observers.upgrade() {
            Some(observers) => remove_observer(&observers, &self.observer),
            None => false,
        }
    }

    /// Whether the observer is still registered.
    pub fn is_active(&self) -> bool {
        self.observers.upgrade().map_or(false, |observers| {
            observers.load().iter().any(|held| same_observer(held, &self.observer))
        })
    }

    /// The observer this subscription refers to.
    pub fn observer(&self) -> &SharedObserver {
        &self.observer
    }
}
