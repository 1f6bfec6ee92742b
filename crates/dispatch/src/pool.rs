use std::sync::Arc;

use tracing::{debug, info};

use jobwerk_core::{DispatchConfig, DispatchError, Job};

use crate::coordinator::Coordinator;
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::scheduler::SchedulerThread;
use crate::worker::WorkerThread;

/// The public dispatcher facade: one worker thread per configured slot, a
/// dedicated scheduler thread, and the coordinator they share.
///
/// Dropping the pool (or calling [`JobPool::shutdown`]) aborts the channel,
/// joins the workers, and stops the scheduler thread. Jobs still sitting on
/// ready queues or in flight at that point are not drained; shut down after
/// quiescence if every submitted job must run.
pub struct JobPool {
    coordinator: Arc<Coordinator>,
    workers: Vec<WorkerThread>,
    scheduler: Option<SchedulerThread>,
}

impl JobPool {
    /// Spin up the pool described by `config`.
    ///
    /// If a worker thread fails to spawn, the workers that did start are
    /// shut down cleanly before the error is returned.
    pub fn new(config: &DispatchConfig) -> Result<Self, DispatchError> {
        let metrics = Arc::new(DispatchMetrics::default());
        let coordinator = Arc::new(Coordinator::new(config, metrics));

        let worker_count = config.resolved_worker_threads();
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            match WorkerThread::spawn(
                id,
                Arc::clone(&coordinator),
                config.pin_workers,
                config.worker_stack_size,
            ) {
                Ok(worker) => workers.push(worker),
                Err(error) => {
                    teardown(&coordinator, workers, None);
                    return Err(error);
                }
            }
        }

        let scheduler = match SchedulerThread::spawn(Arc::clone(&coordinator)) {
            Ok(scheduler) => scheduler,
            Err(error) => {
                teardown(&coordinator, workers, None);
                return Err(error);
            }
        };

        info!(
            workers = worker_count,
            channel_capacity = config.channel_capacity,
            pinned = config.pin_workers,
            "job pool started"
        );

        Ok(Self {
            coordinator,
            workers,
            scheduler: Some(scheduler),
        })
    }

    /// Submit a job. Never blocks; dependencies must be wired beforehand via
    /// [`Job::add_dependency`].
    pub fn submit(&self, job: &Arc<Job>) {
        self.coordinator.submit(job);
    }

    /// Resolve an externally-held dependency on `job` (one added beyond its
    /// predecessors, gating on a resource rather than another job).
    pub fn resolve_dependency(&self, job: &Arc<Job>) {
        self.coordinator.resolve_dependency(job);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.coordinator.metrics().snapshot()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop the pool: abort the channel, join every worker, stop the
    /// scheduler thread. Equivalent to dropping the pool.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        let workers = std::mem::take(&mut self.workers);
        teardown(&self.coordinator, workers, self.scheduler.take());
    }
}

impl Drop for JobPool {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

fn teardown(
    coordinator: &Coordinator,
    workers: Vec<WorkerThread>,
    scheduler: Option<SchedulerThread>,
) {
    if workers.is_empty() && scheduler.is_none() {
        return;
    }
    debug!("shutting down job pool");

    coordinator.channel().abort();
    for worker in workers {
        worker.join();
    }
    if let Some(scheduler) = scheduler {
        scheduler.force_exit();
        coordinator.signal_scheduler();
        scheduler.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobwerk_core::{JobError, Priority, Work};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    fn test_config(workers: usize, channel_capacity: usize) -> DispatchConfig {
        DispatchConfig {
            worker_threads: workers,
            channel_capacity,
            ready_capacity: 4096,
            // CI runners dislike affinity calls
            pin_workers: false,
            worker_stack_size: 0,
        }
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
        let limit = Instant::now() + deadline;
        while !done() {
            assert!(Instant::now() < limit, "condition not reached in time");
            thread::yield_now();
        }
    }

    struct CountingWork {
        name: String,
        runs: Arc<AtomicUsize>,
        hooks: Arc<AtomicUsize>,
    }

    impl CountingWork {
        fn job(name: &str, priority: Priority) -> (Arc<Job>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let runs = Arc::new(AtomicUsize::new(0));
            let hooks = Arc::new(AtomicUsize::new(0));
            let job = Job::new(
                priority,
                CountingWork {
                    name: name.to_string(),
                    runs: Arc::clone(&runs),
                    hooks: Arc::clone(&hooks),
                },
            );
            (job, runs, hooks)
        }
    }

    impl Work for CountingWork {
        fn name(&self) -> &str {
            &self.name
        }

        fn execute(&self) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_executed(&self) {
            self.hooks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn independent_jobs_run_exactly_once() {
        const JOBS: usize = 1_000;

        let pool = JobPool::new(&test_config(4, 16)).unwrap();
        let jobs: Vec<_> = (0..JOBS)
            .map(|i| CountingWork::job(&format!("job-{i}"), Priority::Normal))
            .collect();

        for (job, _, _) in &jobs {
            pool.submit(job);
        }

        wait_until(Duration::from_secs(10), || {
            pool.metrics().completed == JOBS as u64
        });
        pool.shutdown();

        for (_, runs, hooks) in &jobs {
            assert_eq!(runs.load(Ordering::SeqCst), 1);
            assert_eq!(hooks.load(Ordering::SeqCst), 1);
        }
    }

    /// Chain a -> b -> c: each link records the completion order; a link must
    /// not start before its predecessor's completion hook fired.
    #[test]
    fn dependency_chain_runs_in_order() {
        struct Link {
            name: &'static str,
            order: Arc<Mutex<Vec<&'static str>>>,
        }

        impl Work for Link {
            fn name(&self) -> &str {
                self.name
            }

            fn execute(&self) -> Result<(), JobError> {
                self.order.lock().unwrap().push(self.name);
                Ok(())
            }
        }

        let order = Arc::new(Mutex::new(Vec::new()));
        let link = |name| {
            Job::new(
                Priority::Normal,
                Link {
                    name,
                    order: Arc::clone(&order),
                },
            )
        };

        let a = link("a");
        let b = link("b");
        let c = link("c");
        b.add_dependency(&a);
        c.add_dependency(&b);

        let pool = JobPool::new(&test_config(4, 8)).unwrap();
        // submission order must not matter
        pool.submit(&c);
        pool.submit(&b);
        pool.submit(&a);

        wait_until(Duration::from_secs(10), || pool.metrics().completed == 3);
        pool.shutdown();

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    /// A single worker held by a blocker job with channel capacity 1: jobs
    /// submitted while it runs are dispatched high-first when it finishes.
    #[test]
    fn higher_priority_dispatched_first() {
        struct Blocker {
            started: Arc<AtomicBool>,
            release: Arc<AtomicBool>,
        }

        impl Work for Blocker {
            fn name(&self) -> &str {
                "blocker"
            }

            fn execute(&self) -> Result<(), JobError> {
                self.started.store(true, Ordering::Release);
                while !self.release.load(Ordering::Acquire) {
                    thread::yield_now();
                }
                Ok(())
            }
        }

        struct Recorder {
            name: &'static str,
            order: Arc<Mutex<Vec<&'static str>>>,
        }

        impl Work for Recorder {
            fn name(&self) -> &str {
                self.name
            }

            fn execute(&self) -> Result<(), JobError> {
                self.order.lock().unwrap().push(self.name);
                Ok(())
            }
        }

        let started = Arc::new(AtomicBool::new(false));
        let release = Arc::new(AtomicBool::new(false));
        let order = Arc::new(Mutex::new(Vec::new()));

        let pool = JobPool::new(&test_config(1, 1)).unwrap();

        let blocker = Job::new(
            Priority::High,
            Blocker {
                started: Arc::clone(&started),
                release: Arc::clone(&release),
            },
        );
        pool.submit(&blocker);
        wait_until(Duration::from_secs(10), || started.load(Ordering::Acquire));

        let recorder = |name, priority| {
            Job::new(
                priority,
                Recorder {
                    name,
                    order: Arc::clone(&order),
                },
            )
        };
        // low submitted first; high must still run first once the worker frees up
        pool.submit(&recorder("low", Priority::Low));
        pool.submit(&recorder("normal", Priority::Normal));
        pool.submit(&recorder("high", Priority::High));

        release.store(true, Ordering::Release);
        wait_until(Duration::from_secs(10), || pool.metrics().completed == 4);
        pool.shutdown();

        assert_eq!(*order.lock().unwrap(), vec!["high", "normal", "low"]);
    }

    /// Far more jobs than channel slots: backpressure requeues instead of
    /// deadlocking, and everything still completes.
    #[test]
    fn overcommitted_channel_makes_progress() {
        const JOBS: usize = 500;

        let pool = JobPool::new(&test_config(2, 2)).unwrap();
        let jobs: Vec<_> = (0..JOBS)
            .map(|i| CountingWork::job(&format!("burst-{i}"), Priority::Normal))
            .collect();

        for (job, _, _) in &jobs {
            pool.submit(job);
        }

        wait_until(Duration::from_secs(30), || {
            pool.metrics().completed == JOBS as u64
        });
        let snapshot = pool.metrics();
        pool.shutdown();

        assert_eq!(snapshot.executed, JOBS as u64);
        for (_, runs, _) in &jobs {
            assert_eq!(runs.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn submissions_from_many_threads() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 200;

        let pool = Arc::new(JobPool::new(&test_config(4, 16)).unwrap());
        let runs = Arc::new(AtomicUsize::new(0));

        struct Bump {
            runs: Arc<AtomicUsize>,
        }

        impl Work for Bump {
            fn execute(&self) -> Result<(), JobError> {
                self.runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        thread::scope(|scope| {
            for _ in 0..THREADS {
                let pool = Arc::clone(&pool);
                let runs = Arc::clone(&runs);
                scope.spawn(move || {
                    for _ in 0..PER_THREAD {
                        let job = Job::new(Priority::Normal, Bump { runs: Arc::clone(&runs) });
                        pool.submit(&job);
                    }
                });
            }
        });

        wait_until(Duration::from_secs(10), || {
            pool.metrics().completed == (THREADS * PER_THREAD) as u64
        });
        assert_eq!(runs.load(Ordering::SeqCst), THREADS * PER_THREAD);
    }

    /// Predecessor runs to completion before the dependent is submitted: the
    /// dependent must not execute early, and its late submit must enqueue it.
    #[test]
    fn dependent_submitted_after_predecessor_completed() {
        let pool = JobPool::new(&test_config(2, 4)).unwrap();
        let (a, _, _) = CountingWork::job("a", Priority::Normal);
        let (b, b_runs, b_hooks) = CountingWork::job("b", Priority::Normal);
        b.add_dependency(&a);

        pool.submit(&a);
        wait_until(Duration::from_secs(10), || pool.metrics().completed == 1);
        assert_eq!(
            b_runs.load(Ordering::SeqCst),
            0,
            "dependent ran before its submission"
        );

        pool.submit(&b);
        wait_until(Duration::from_secs(10), || pool.metrics().completed == 2);
        pool.shutdown();

        assert_eq!(b_runs.load(Ordering::SeqCst), 1);
        assert_eq!(b_hooks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_jobs_still_complete() {
        struct Failing;

        impl Work for Failing {
            fn name(&self) -> &str {
                "failing"
            }

            fn execute(&self) -> Result<(), JobError> {
                Err(JobError::Failed("synthetic".into()))
            }
        }

        let pool = JobPool::new(&test_config(2, 4)).unwrap();
        let (ok, ok_runs, _) = CountingWork::job("after-failure", Priority::Normal);
        let failing = Job::new(Priority::Normal, Failing);
        ok.add_dependency(&failing);

        pool.submit(&ok);
        pool.submit(&failing);

        wait_until(Duration::from_secs(10), || pool.metrics().completed == 2);
        let snapshot = pool.metrics();
        pool.shutdown();

        // failure is reported, not fatal: the dependent still ran
        assert_eq!(snapshot.failed, 1);
        assert_eq!(ok_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn idle_pool_shuts_down_promptly() {
        let pool = JobPool::new(&test_config(4, 8)).unwrap();
        assert_eq!(pool.worker_count(), 4);

        let start = Instant::now();
        pool.shutdown();
        assert!(start.elapsed() < Duration::from_secs(5), "shutdown hung");
    }

    #[test]
    fn drop_is_equivalent_to_shutdown() {
        let (job, runs, _) = CountingWork::job("before-drop", Priority::Normal);
        {
            let pool = JobPool::new(&test_config(2, 4)).unwrap();
            pool.submit(&job);
            wait_until(Duration::from_secs(10), || pool.metrics().completed == 1);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
