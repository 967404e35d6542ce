//! Time-bounded suppression of repeated fingerprints.
//!
//! Semantics:
//! - The first occurrence of a fingerprint is admitted and opens a suppression window of
//!   `ttl`. Every further occurrence inside the window is suppressed.
//! - Suppressed occurrences never extend or reset the window.
//! - When the window closes the fingerprint is forgotten and the next occurrence starts a
//!   fresh cycle.
//!
//! Each suppression carries its deadline (read from a [`Clock`]) and, when called inside a
//! tokio runtime, a one-shot expiry task that sleeps the TTL through a [`Sleeper`] and then
//! removes the entry. The task handle lives next to the entry and is aborted whenever the
//! entry is dropped, so clearing or dropping the window frees timers deterministically.
//! Outside a runtime the deadline alone decides, and stale entries are swept on admission.

use crate::clock::{Clock, MonotonicClock};
use crate::sleeper::{Sleeper, TokioSleeper};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default suppression TTL.
pub const DEFAULT_TTL: Duration = Duration::from_millis(3000);

type Entries = Mutex<HashMap<String, Suppression>>;

#[derive(Debug)]
struct Suppression {
    generation: u64,
    expires_at_millis: u64,
    _expiry: Option<ExpiryTask>,
}

/// Handle to a scheduled expiry; aborts the task when dropped.
#[derive(Debug)]
struct ExpiryTask(JoinHandle<()>);

impl Drop for ExpiryTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Debug, Default)]
struct WindowState {
    entries: Entries,
    next_generation: Mutex<u64>,
}

/// Deduplication window keyed by fingerprint.
///
/// Clones share the same suppression set.
#[derive(Debug, Clone)]
pub struct DedupWindow {
    state: Arc<WindowState>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl DedupWindow {
    /// Window with the given TTL, a monotonic clock, and tokio timers.
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(WindowState::default()),
            ttl,
            clock: Arc::new(MonotonicClock::default()),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Override the clock used for deadlines.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Override the sleeper used by expiry tasks.
    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub(crate) fn with_shared(
        ttl: Duration,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self { state: Arc::new(WindowState::default()), ttl, clock, sleeper }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Decide admit (`true`) or suppress (`false`) for one occurrence of `fingerprint`.
    ///
    /// Read-then-write happens under one lock, so concurrent callers with the same
    /// fingerprint see exactly one admission per window. Logging and expiry scheduling run
    /// after the lock is released.
    pub fn should_admit(&self, fingerprint: &str) -> bool {
        let now = self.clock.now_millis();
        let generation = {
            let mut entries = self.lock_entries();
            let suppressed =
                entries.get(fingerprint).map_or(false, |entry| now < entry.expires_at_millis);
            if suppressed {
                None
            } else {
                // covers the stale entry for this fingerprint too
                entries.retain(|_, entry| entry.expires_at_millis > now);

                let generation = self.next_generation();
                let expires_at_millis = now.saturating_add(ttl_millis(self.ttl));
                entries.insert(
                    fingerprint.to_string(),
                    Suppression { generation, expires_at_millis, _expiry: None },
                );
                Some(generation)
            }
        };

        let Some(generation) = generation else {
            tracing::debug!(target: "caught::dedup", fingerprint, "suppressed duplicate");
            return false;
        };
        if let Some(expiry) = self.schedule_expiry(fingerprint, generation) {
            let mut entries = self.lock_entries();
            match entries.get_mut(fingerprint) {
                Some(entry) if entry.generation == generation => entry._expiry = Some(expiry),
                // the cycle already ended; dropping the handle aborts the timer
                _ => drop(expiry),
            }
        }
        true
    }

    /// Whether `fingerprint` is currently inside a suppression window.
    pub fn is_suppressed(&self, fingerprint: &str) -> bool {
        let now = self.clock.now_millis();
        self.lock_entries().get(fingerprint).map_or(false, |entry| now < entry.expires_at_millis)
    }

    /// Number of live suppression entries (including ones whose deadline passed but have
    /// not been swept yet).
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Forget every fingerprint and cancel their expiry tasks.
    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Suppression>> {
        self.state.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        let mut counter =
            self.state.next_generation.lock().unwrap_or_else(PoisonError::into_inner);
        *counter = counter.wrapping_add(1);
        *counter
    }

    fn schedule_expiry(&self, fingerprint: &str, generation: u64) -> Option<ExpiryTask> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let state: Weak<WindowState> = Arc::downgrade(&self.state);
        let sleep = self.sleeper.sleep(self.ttl);
        let key = fingerprint.to_string();

        let handle = runtime.spawn(async move {
            sleep.await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let expired = {
                let mut entries = state.entries.lock().unwrap_or_else(PoisonError::into_inner);
                let current =
                    entries.get(&key).map_or(false, |entry| entry.generation == generation);
                // dropping the entry aborts this task's own handle; we are already finishing
                current && entries.remove(&key).is_some()
            };
            if expired {
                tracing::debug!(target: "caught::dedup", fingerprint = %key, "suppression expired");
            }
        });
        Some(ExpiryTask(handle))
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}
