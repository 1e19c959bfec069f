//! Progress reporting seam between the scheduler and any display
//!
//! Workers call [`ProgressSink::advance`] once per partition that reaches an
//! outcome. Implementations must tolerate concurrent calls from every worker.

#[cfg(test)]
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives per-partition progress from the workers
pub trait ProgressSink: Send + Sync {
    /// Record `n` more partitions as done (fetched, resumed or failed)
    fn advance(&self, n: u64);

    /// The run is over
    fn finish(&self);
}

/// Discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn advance(&self, _n: u64) {}

    fn finish(&self) {}
}

/// Counts progress without displaying it
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CountingProgress {
    position: AtomicU64,
    finished: AtomicU64,
}

#[cfg(test)]
impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Times `finish` was called
    pub fn finish_count(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
impl ProgressSink for CountingProgress {
    fn advance(&self, n: u64) {
        self.position.fetch_add(n, Ordering::Relaxed);
    }

    fn finish(&self) {
        self.finished.fetch_add(1, Ordering::Relaxed);
    }
}
