//! Counters for streaming calls.
//!
//! All counters are atomic and can be read while calls are in flight.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StreamStats {
    /// Streams whose generator is currently alive.
    open: AtomicU64,
    /// Streams that produced their last frame.
    completed: AtomicU64,
    /// Streams dropped by the transport before their last frame.
    cancelled: AtomicU64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_open(&self) {
        self.open.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_close(&self, finished: bool) {
        self.open.fetch_sub(1, Ordering::Relaxed);
        if finished {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn open(&self) -> u64 {
        self.open.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }
}
