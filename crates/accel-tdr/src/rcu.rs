//! Read-mostly publication with a reader grace period.
//!
//! [`ReadMostly`] keeps the current version of a value behind an `Arc`.
//! Readers take a momentary lock to clone that `Arc` and then traverse their
//! snapshot without holding anything, so a long traversal never blocks a
//! writer and a writer never tears a structure a reader is looking at.
//!
//! Writers are serialised among themselves. [`ReadMostly::publish`] swaps in
//! the new version and returns at once; use it when nothing in the old
//! version is being retired. [`ReadMostly::update`] additionally waits for a
//! grace period: every reader that still holds the superseded version must
//! drop it before `update` returns. Readers arriving after publication see
//! the new version and do not extend the grace period.
//!
//! Callers must not hold a snapshot of the same `ReadMostly` while calling
//! `update`, or the grace period never ends. `publish` has no such
//! restriction.

use crossbeam::utils::Backoff;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;

const GRACE_PERIOD_SLEEP: Duration = Duration::from_micros(50);

/// A value read far more often than it is replaced.
#[derive(Debug)]
pub struct ReadMostly<T> {
    current: RwLock<Arc<T>>,
    writer: Mutex<()>,
}

impl<T> ReadMostly<T> {
    /// Publish the initial version.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
            writer: Mutex::new(()),
        }
    }

    /// Take a snapshot of the current version.
    #[must_use]
    pub fn read(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current version without waiting for readers.
    ///
    /// Readers still holding the old version keep a valid snapshot of it.
    pub fn publish<R>(&self, f: impl FnOnce(&T) -> (T, R)) -> R {
        let _writer = self.writer.lock();
        let (_old, result) = self.swap(f);
        result
    }

    /// Replace the current version and wait out the grace period.
    ///
    /// `f` receives the current version and returns the next one together
    /// with a value handed back to the caller once the grace period for the
    /// old version has elapsed.
    pub fn update<R>(&self, f: impl FnOnce(&T) -> (T, R)) -> R {
        let _writer = self.writer.lock();
        let (old, result) = self.swap(f);
        wait_for_readers(&old);
        result
    }

    // Caller holds the writer lock.
    fn swap<R>(&self, f: impl FnOnce(&T) -> (T, R)) -> (Arc<T>, R) {
        let snapshot = self.read();
        let (next, result) = f(&snapshot);
        drop(snapshot);
        let mut current = self.current.write();
        (std::mem::replace(&mut *current, Arc::new(next)), result)
    }
}

/// Block until `old` is the only remaining reference to its version.
fn wait_for_readers<T>(old: &Arc<T>) {
    let backoff = Backoff::new();
    while Arc::strong_count(old) > 1 {
        if backoff.is_completed() {
            std::thread::sleep(GRACE_PERIOD_SLEEP);
        } else {
            backoff.snooze();
        }
    }
}
