//! Cooperative cancellation
//!
//! A [`CancelHandle`] is cloned into every suspension point of one request
//! (retry sleeps, the stream pump, the watchdog). Cancellation is cooperative:
//! the flag is checked between streamed chunks, so a chunk already in flight
//! may still be delivered, but nothing new starts after the flag is observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared cancellation flag for one in-flight request
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    /// Create a fresh, uncancelled handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the cancellation flag and wake all waiters; idempotent
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}
