use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Dispatcher counters, shared across workers and the scheduling pass.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    submitted: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    completed: AtomicU64,
    requeued: AtomicU64,
    passes: AtomicU64,
}

/// Point-in-time view of the dispatcher counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    /// Jobs handed to `submit`.
    pub submitted: u64,
    /// `execute` calls finished on a worker (success or failure).
    pub executed: u64,
    /// `execute` calls that returned an error.
    pub failed: u64,
    /// Completion hooks fired (`on_executed`).
    pub completed: u64,
    /// Backpressure fallbacks: jobs put back on their ready queue because
    /// the transaction channel was full.
    pub requeued: u64,
    /// Scheduling pass bodies run.
    pub passes: u64,
}

impl DispatchMetrics {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pass(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
        }
    }
}
