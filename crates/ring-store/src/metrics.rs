use std::sync::atomic::{AtomicU64, Ordering};

/// Lightweight, lock-free counters for monitoring ring activity.
///
/// Fields are updated from inside the write lock (cheap, uncontended) and read from
/// anywhere without locking.
#[derive(Debug, Default)]
pub struct RingMetrics {
    appends: AtomicU64,
    snapshots: AtomicU64,
    wraps: AtomicU64,
}

impl RingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self) {
        self.appends.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wrap(&self) {
        self.wraps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot(&self) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of samples appended since creation.
    pub fn appends(&self) -> u64 {
        self.appends.load(Ordering::Relaxed)
    }

    /// Total number of snapshots taken since creation.
    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }

    /// Number of times the write cursor wrapped back to index 0.
    pub fn wraps(&self) -> u64 {
        self.wraps.load(Ordering::Relaxed)
    }
}
