use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use jobwerk_core::DispatchError;

use crate::coordinator::Coordinator;

/// The dedicated scheduler thread.
///
/// Sleeps on the coordinator's signal and runs a scheduling pass per wakeup.
/// Workers also run passes directly after completing a transaction, so this
/// thread mostly covers submissions arriving while no worker is finishing
/// anything. The coalescing counter makes the overlap harmless.
pub(crate) struct SchedulerThread {
    force_exit: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SchedulerThread {
    pub fn spawn(coordinator: Arc<Coordinator>) -> Result<Self, DispatchError> {
        let force_exit = Arc::new(AtomicBool::new(false));
        let name = "scheduler".to_string();

        let handle = {
            let force_exit = Arc::clone(&force_exit);
            thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_loop(&coordinator, &force_exit))
                .map_err(|source| DispatchError::ThreadSpawn { name, source })?
        };

        Ok(Self { force_exit, handle })
    }

    /// Ask the thread to exit. The caller must signal the coordinator
    /// afterwards so a sleeping loop observes the flag.
    pub fn force_exit(&self) {
        self.force_exit.store(true, Ordering::Release);
    }

    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("scheduler thread panicked");
        }
    }
}

fn run_loop(coordinator: &Coordinator, force_exit: &AtomicBool) {
    loop {
        // snapshot before checking work, so a signal racing the pass below
        // wakes the next wait instead of being lost
        let seen = coordinator.scheduler_signal().generation();

        if force_exit.load(Ordering::Acquire) {
            debug!("scheduler thread exiting");
            return;
        }

        coordinator.do_scheduling();
        coordinator.scheduler_signal().wait(seen);
    }
}
