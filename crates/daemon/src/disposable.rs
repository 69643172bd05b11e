//! Idle-lifetime tracking for server-side objects.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Tracks when a server-side object was last useful.
///
/// Every public operation touches the tracker; while any operation is
/// in flight (awaiting a dialog, driving a plugin) a busy guard keeps
/// the object alive regardless of the clock. The owning registry reaps
/// objects whose tracker [`is_expired`](Disposable::is_expired).
pub(crate) struct Disposable {
    max_idle: Duration,
    last_use: Mutex<Instant>,
    busy: AtomicUsize,
}

impl Disposable {
    pub fn new(max_idle: Duration) -> Self {
        Self {
            max_idle,
            last_use: Mutex::new(Instant::now()),
            busy: AtomicUsize::new(0),
        }
    }

    /// Re-arms the idle timer.
    pub fn keep_in_use(&self) {
        *self.last_use.lock() = Instant::now();
    }

    /// Marks an operation in flight until the guard drops.
    pub fn busy_guard(&self) -> BusyGuard<'_> {
        self.busy.fetch_add(1, Ordering::SeqCst);
        BusyGuard { inner: self }
    }

    pub fn is_expired(&self) -> bool {
        self.busy.load(Ordering::SeqCst) == 0
            && self.last_use.lock().elapsed() >= self.max_idle
    }
}

pub(crate) struct BusyGuard<'a> {
    inner: &'a Disposable,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.inner.busy.fetch_sub(1, Ordering::SeqCst);
        self.inner.keep_in_use();
    }
}
