use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use jobwerk_core::DispatchError;

use crate::coordinator::Coordinator;

/// A worker thread: pops transactions off the channel, executes them, marks
/// them completed and re-enters the scheduling pass.
///
/// Workers never run completion hooks and never touch the ready queues or
/// the pending list directly; both belong to the scheduling pass.
pub(crate) struct WorkerThread {
    handle: JoinHandle<()>,
}

impl WorkerThread {
    /// Spawn worker `id`, optionally pinned to a core.
    ///
    /// A spawn failure is surfaced as [`DispatchError::ThreadSpawn`] so the
    /// caller can tear down the workers that did start.
    pub fn spawn(
        id: usize,
        coordinator: Arc<Coordinator>,
        pin: bool,
        stack_size: usize,
    ) -> Result<Self, DispatchError> {
        let name = format!("worker-{id}");
        let mut builder = thread::Builder::new().name(name.clone());
        if stack_size > 0 {
            builder = builder.stack_size(stack_size);
        }

        let handle = builder
            .spawn(move || {
                if pin {
                    pin_to_core(id);
                }
                run_loop(&coordinator);
            })
            .map_err(|source| DispatchError::ThreadSpawn { name, source })?;

        Ok(Self { handle })
    }

    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("worker thread panicked");
        }
    }
}

/// Pin the current thread to a core chosen round-robin from the reported
/// core ids. Degrades to unpinned when the platform reports none.
fn pin_to_core(worker_id: usize) {
    match core_affinity::get_core_ids() {
        Some(cores) if !cores.is_empty() => {
            let core = cores[worker_id % cores.len()];
            if core_affinity::set_for_current(core) {
                debug!(worker_id, core_id = core.id, "worker pinned");
            } else {
                warn!(worker_id, core_id = core.id, "core pinning rejected, running unpinned");
            }
        }
        _ => warn!(worker_id, "no core ids available, running unpinned"),
    }
}

/// Worker loop: block for a transaction, execute it, mark it completed, then
/// drive a scheduling pass so the freed slot and any unblocked dependents
/// are handled without waiting for the scheduler thread.
fn run_loop(coordinator: &Coordinator) {
    loop {
        // blocking pop returns None only on abort
        let Some((slot, job)) = coordinator.channel().pop(true) else {
            debug!("channel aborted, worker exiting");
            return;
        };

        if let Err(error) = job.execute() {
            warn!(job = job.name(), %error, "job execution failed");
            coordinator.metrics().record_failed();
        }
        coordinator.metrics().record_executed();

        coordinator.channel().set_completed(slot);
        coordinator.do_scheduling();
    }
}
