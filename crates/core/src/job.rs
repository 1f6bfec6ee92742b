use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::priority::Priority;

/// Error type for job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),
    #[error("job skipped: {0}")]
    Skipped(String),
}

/// A unit of work the dispatcher can execute.
///
/// `execute` runs on an arbitrary worker thread and must not assume access
/// to thread-local engine state. `on_executed` is invoked exactly once after
/// execution completes, from the scheduling pass — not necessarily on the
/// worker that ran `execute`.
pub trait Work: Send + Sync {
    /// Human-readable name for logging and metrics.
    fn name(&self) -> &str {
        "job"
    }

    /// Execute the work on a worker thread.
    fn execute(&self) -> Result<(), JobError>;

    /// Completion hook. Submitters use this to signal their own completion
    /// flags; dependent jobs wired via [`Job::add_dependency`] are unblocked
    /// by the dispatcher after this returns.
    fn on_executed(&self) {}
}

/// The unit-of-work record: a priority, an unresolved-dependency counter, a
/// scheduled-once flag, and the [`Work`] contract.
///
/// Jobs are created and owned by the submitting subsystem and shared with
/// the dispatcher as `Arc<Job>`. The dispatcher drops its references after
/// `on_executed` has fired; the submitter may release the job then.
pub struct Job {
    priority: Priority,
    /// Starts at 1; each `add_dependency` adds one. A value of 1 means
    /// "ready to run"; predecessors decrement it back down on completion.
    dependency_count: AtomicU32,
    /// Set exactly once, by submit. A job is enqueued only when both
    /// submitted and fully resolved; SeqCst here and on the counter makes
    /// a racing submit/resolve unable to both skip the enqueue.
    submitted: AtomicBool,
    /// Set exactly once, when the job enters a ready queue.
    scheduled: AtomicBool,
    /// Successor jobs to unblock when this job completes. Wired before the
    /// predecessor is enqueued, drained once by the scheduling pass.
    dependents: Mutex<Vec<Arc<Job>>>,
    work: Box<dyn Work>,
}

impl Job {
    /// Create a job around the given work.
    pub fn new(priority: Priority, work: impl Work + 'static) -> Arc<Job> {
        Arc::new(Job {
            priority,
            dependency_count: AtomicU32::new(1),
            submitted: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
            dependents: Mutex::new(Vec::new()),
            work: Box::new(work),
        })
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn name(&self) -> &str {
        self.work.name()
    }

    /// Current unresolved-dependency count (1 = ready to run).
    pub fn dependency_count(&self) -> u32 {
        self.dependency_count.load(Ordering::SeqCst)
    }

    /// Whether the job has been handed to the dispatcher.
    pub fn is_submitted(&self) -> bool {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Whether the job has already been placed on a ready queue.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Declare that `self` must not run until `predecessor` has completed.
    ///
    /// Must be called before the predecessor is submitted; wiring a
    /// dependency on an already-enqueued job is a race and fails loudly.
    pub fn add_dependency(self: &Arc<Self>, predecessor: &Arc<Job>) {
        assert!(
            !predecessor.is_scheduled(),
            "dependency on '{}' wired after it was enqueued",
            predecessor.name()
        );
        self.dependency_count.fetch_add(1, Ordering::AcqRel);
        predecessor
            .dependents
            .lock()
            .unwrap()
            .push(Arc::clone(self));
    }

    /// Claim the submitted flag. Returns true for exactly one caller.
    ///
    /// Dispatcher-internal: guards against double submission.
    pub fn mark_submitted(&self) -> bool {
        self.submitted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Claim the scheduled flag. Returns true for exactly one caller.
    ///
    /// Dispatcher-internal: guards against a job entering two ready queues.
    pub fn mark_scheduled(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Resolve one dependency. Returns true when the job just became ready.
    ///
    /// Dispatcher-internal: called once per completed predecessor. Resolving
    /// a job that is already ready is a corrupt count and fails loudly.
    pub fn resolve_one(&self) -> bool {
        let prev = self.dependency_count.fetch_sub(1, Ordering::SeqCst);
        assert!(prev >= 2, "dependency counter underflow");
        prev == 2
    }

    /// Drain the dependent list. Called once, after this job completed.
    pub fn take_dependents(&self) -> Vec<Arc<Job>> {
        std::mem::take(&mut *self.dependents.lock().unwrap())
    }

    /// Run the work on the current thread.
    pub fn execute(&self) -> Result<(), JobError> {
        self.work.execute()
    }

    /// Run the completion hook on the current thread.
    pub fn on_executed(&self) {
        self.work.on_executed()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name())
            .field("priority", &self.priority)
            .field("dependency_count", &self.dependency_count())
            .field("submitted", &self.is_submitted())
            .field("scheduled", &self.is_scheduled())
            .finish()
    }
}
