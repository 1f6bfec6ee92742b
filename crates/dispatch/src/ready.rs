use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use jobwerk_core::{Job, Priority};

/// One bounded lock-free queue per priority level, holding jobs whose
/// dependencies are fully resolved and who are waiting for a transaction.
///
/// A job enters at most one queue, determined by its priority, and only
/// after its dependency count reached 1 (enforced by the coordinator's
/// scheduled-flag claim).
pub(crate) struct ReadyQueues {
    queues: [ArrayQueue<Arc<Job>>; Priority::COUNT],
}

impl ReadyQueues {
    pub fn new(capacity_per_level: usize) -> Self {
        assert!(capacity_per_level > 0, "ready capacity must be non-zero");
        Self {
            queues: std::array::from_fn(|_| ArrayQueue::new(capacity_per_level)),
        }
    }

    /// Enqueue at the job's priority. A full queue yield-retries; at sane
    /// capacities producers never observe this.
    pub fn push(&self, job: Arc<Job>) {
        let queue = &self.queues[job.priority().index()];
        let mut item = job;
        loop {
            match queue.push(item) {
                Ok(()) => return,
                Err(back) => {
                    item = back;
                    std::thread::yield_now();
                }
            }
        }
    }

    /// Pop the next ready job in strict priority order: High drains before
    /// Normal, Normal before Low; FIFO within one level.
    pub fn pop_next(&self) -> Option<Arc<Job>> {
        for queue in &self.queues {
            if let Some(job) = queue.pop() {
                return Some(job);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(|queue| queue.is_empty())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queues.iter().map(|queue| queue.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobwerk_core::{JobError, Work};

    struct Named(&'static str);

    impl Work for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn execute(&self) -> Result<(), JobError> {
            Ok(())
        }
    }

    #[test]
    fn strict_priority_order() {
        let ready = ReadyQueues::new(8);
        ready.push(Job::new(Priority::Low, Named("low")));
        ready.push(Job::new(Priority::High, Named("high")));
        ready.push(Job::new(Priority::Normal, Named("normal")));

        assert_eq!(ready.pop_next().unwrap().name(), "high");
        assert_eq!(ready.pop_next().unwrap().name(), "normal");
        assert_eq!(ready.pop_next().unwrap().name(), "low");
        assert!(ready.pop_next().is_none());
    }

    #[test]
    fn fifo_within_one_level() {
        let ready = ReadyQueues::new(8);
        ready.push(Job::new(Priority::Normal, Named("first")));
        ready.push(Job::new(Priority::Normal, Named("second")));
        ready.push(Job::new(Priority::Normal, Named("third")));

        assert_eq!(ready.pop_next().unwrap().name(), "first");
        assert_eq!(ready.pop_next().unwrap().name(), "second");
        assert_eq!(ready.pop_next().unwrap().name(), "third");
    }

    #[test]
    fn empty_and_len() {
        let ready = ReadyQueues::new(2);
        assert!(ready.is_empty());
        ready.push(Job::new(Priority::High, Named("one")));
        assert!(!ready.is_empty());
        assert_eq!(ready.len(), 1);
    }
}
