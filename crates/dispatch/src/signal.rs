use std::sync::{Condvar, Mutex};

/// Generation-counted wakeup signal.
///
/// Waiters snapshot the generation before checking their queue; `wait` only
/// sleeps if no notification arrived after the snapshot, so a wakeup between
/// the queue check and the wait is never lost.
pub(crate) struct Signal {
    generation: Mutex<u64>,
    condvar: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            generation: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }

    /// Current generation, to be passed to a later [`Signal::wait`].
    pub fn generation(&self) -> u64 {
        *self.generation.lock().unwrap()
    }

    /// Wake every waiter and invalidate outstanding generation snapshots.
    pub fn notify_all(&self) {
        let mut generation = self.generation.lock().unwrap();
        *generation = generation.wrapping_add(1);
        self.condvar.notify_all();
    }

    /// Block until a notification arrives after the `seen` snapshot.
    /// Returns immediately if one already has.
    pub fn wait(&self, seen: u64) {
        let guard = self.generation.lock().unwrap();
        let _guard = self
            .condvar
            .wait_while(guard, |generation| *generation == seen)
            .unwrap();
    }
}
