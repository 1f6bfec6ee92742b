use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use jobwerk_core::{DispatchConfig, Job};

use crate::channel::{SlotId, TransactionChannel};
use crate::metrics::DispatchMetrics;
use crate::ready::ReadyQueues;
use crate::signal::Signal;

/// A dispatched transaction awaiting reclaim: the slot id plus the job it
/// carries, so the completion hook can run after the worker finished.
struct PendingTransaction {
    slot: SlotId,
    job: Arc<Job>,
}

/// Owns the ready queues, the transaction channel, the pending-transaction
/// list and the re-entrant scheduling pass.
///
/// Shared by producers (submit), workers (completion → scheduling pass) and
/// the scheduler thread. The only locks are the scheduler signal and the
/// pending list; the latter is touched exclusively inside the single active
/// scheduling pass, so it is uncontended by construction.
pub(crate) struct Coordinator {
    channel: TransactionChannel<Arc<Job>>,
    ready: ReadyQueues,
    pending: Mutex<Vec<PendingTransaction>>,
    /// Coalescing counter: the 0→1 incrementer executes the pass body and
    /// loops while other requesters arrived meanwhile. No request is lost,
    /// and at most one body runs at a time.
    scheduling_requests: AtomicU32,
    /// Concurrent pass-body depth; the coalescing counter bounds it at 1.
    in_pass: AtomicU32,
    /// High-water mark of `in_pass`.
    max_in_pass: AtomicU32,
    scheduler_signal: Signal,
    metrics: Arc<DispatchMetrics>,
}

impl Coordinator {
    pub fn new(config: &DispatchConfig, metrics: Arc<DispatchMetrics>) -> Self {
        Self {
            channel: TransactionChannel::new(config.channel_capacity),
            ready: ReadyQueues::new(config.ready_capacity),
            pending: Mutex::new(Vec::new()),
            scheduling_requests: AtomicU32::new(0),
            in_pass: AtomicU32::new(0),
            max_in_pass: AtomicU32::new(0),
            scheduler_signal: Signal::new(),
            metrics,
        }
    }

    pub fn channel(&self) -> &TransactionChannel<Arc<Job>> {
        &self.channel
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    pub fn scheduler_signal(&self) -> &Signal {
        &self.scheduler_signal
    }

    /// Wake the scheduler thread. Coalesces with an in-flight pass.
    pub fn signal_scheduler(&self) {
        self.scheduler_signal.notify_all();
    }

    /// Submit a job for execution.
    ///
    /// Never blocks. A job that is both submitted and fully resolved goes to
    /// its ready queue; one with unresolved predecessors stays un-enqueued
    /// until the last completion resolves it. Either way the scheduler
    /// thread is woken so a pass happens promptly.
    pub fn submit(&self, job: &Arc<Job>) {
        assert!(
            job.mark_submitted(),
            "job '{}' submitted twice",
            job.name()
        );
        let dependency_count = job.dependency_count();
        assert!(
            dependency_count > 0,
            "job '{}' has a corrupt dependency count",
            job.name()
        );

        if dependency_count == 1 {
            self.push_ready(job);
        }
        self.metrics.record_submitted();
        self.signal_scheduler();
    }

    /// Resolve one of the job's unresolved dependencies. When the last one
    /// resolves on a submitted job, it takes the same enqueue path as an
    /// unencumbered submit; a not-yet-submitted job stays out of the ready
    /// queues, and its own submit picks the readiness up from the counter.
    ///
    /// Called by the scheduling pass for wired dependents, and available to
    /// producers for external resource-ready signaling.
    pub fn resolve_dependency(&self, job: &Arc<Job>) {
        if job.resolve_one() && job.is_submitted() {
            self.push_ready(job);
            self.signal_scheduler();
        }
    }

    /// Claim the scheduled flag and enqueue. Submit and resolve can both
    /// observe readiness when they race; the claim lets exactly one of them
    /// enqueue, so "enters a ready queue exactly once" holds on every path.
    fn push_ready(&self, job: &Arc<Job>) {
        if job.mark_scheduled() {
            self.ready.push(Arc::clone(job));
        }
    }

    /// Re-entrant coalesced scheduling pass.
    ///
    /// Increment-then-loop-until-drained: the thread that takes the counter
    /// from 0 to 1 runs the body, then decrements; if other threads
    /// requested a pass meanwhile, it loops and re-runs the body for them.
    /// Every other caller returns immediately.
    pub fn do_scheduling(&self) {
        let mut requests = self.scheduling_requests.fetch_add(1, Ordering::AcqRel) + 1;
        if requests != 1 {
            return;
        }
        loop {
            self.run_pass();
            requests = self.scheduling_requests.fetch_sub(1, Ordering::AcqRel) - 1;
            if requests == 0 {
                break;
            }
        }
    }

    /// One pass body: reclaim completed transactions, then drain ready jobs
    /// into the channel, until neither makes progress.
    fn run_pass(&self) {
        let depth = self.in_pass.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_pass.fetch_max(depth, Ordering::SeqCst);
        self.metrics.record_pass();

        loop {
            let reclaimed = self.reclaim_completed();
            let dispatched = self.dispatch_ready();
            if reclaimed == 0 && dispatched == 0 {
                break;
            }
        }

        self.in_pass.fetch_sub(1, Ordering::SeqCst);
    }

    /// Run completion hooks for finished transactions, unblock their
    /// dependents, and return the slots to the pool. Removal order among
    /// siblings is unspecified (swap_remove).
    fn reclaim_completed(&self) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let before = pending.len();

        let mut i = 0;
        while i < pending.len() {
            if self.channel.is_completed(pending[i].slot) {
                let transaction = pending.swap_remove(i);
                trace!(job = transaction.job.name(), "reclaiming completed transaction");
                transaction.job.on_executed();
                for dependent in transaction.job.take_dependents() {
                    self.resolve_dependency(&dependent);
                }
                self.channel.dealloc(transaction.slot);
                self.metrics.record_completed();
            } else {
                i += 1;
            }
        }

        before - pending.len()
    }

    /// Drain ready jobs into the channel in strict priority order. A full
    /// channel re-enqueues the popped job and stops; the next pass retries.
    fn dispatch_ready(&self) -> usize {
        let mut dispatched = 0;
        while let Some(job) = self.ready.pop_next() {
            let Some(slot) = self.channel.alloc(false) else {
                self.requeue(job);
                break;
            };
            match self.channel.push(slot, Arc::clone(&job), false) {
                Ok(()) => {
                    self.pending
                        .lock()
                        .unwrap()
                        .push(PendingTransaction { slot, job });
                    dispatched += 1;
                }
                Err((slot, job)) => {
                    self.channel.dealloc(slot);
                    self.requeue(job);
                    break;
                }
            }
        }
        dispatched
    }

    /// Backpressure fallback: put the job back on its ready queue. It keeps
    /// its scheduled flag; dispatch degrades to "try again next pass".
    fn requeue(&self, job: Arc<Job>) {
        trace!(job = job.name(), "channel full, requeueing ready job");
        self.metrics.record_requeued();
        self.ready.push(job);
    }

    /// Observed maximum number of concurrently-executing pass bodies.
    #[cfg(test)]
    pub fn max_in_pass(&self) -> u32 {
        self.max_in_pass.load(Ordering::SeqCst)
    }
}
