//! dispatch-demo — synthetic workload driver for the job pool.
//!
//! Submits a burst of independent jobs at mixed priorities plus a dependency
//! chain, waits for everything to complete, and prints the metrics snapshot
//! as JSON.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{info, warn};

use jobwerk_dispatch::{DispatchConfig, Job, JobError, JobPool, Priority, Work};

// ── CLI ─────────────────────────────────────────────────────────────

/// Job pool demo — synthetic burst plus a dependency chain.
#[derive(Parser, Debug)]
#[command(name = "dispatch-demo", version, about)]
struct Cli {
    /// Path to a dispatch TOML config file.
    #[arg(long, env = "DISPATCH_CONFIG")]
    config: Option<String>,

    /// Worker thread count (overrides config; 0 = logical CPU count).
    #[arg(long, env = "DISPATCH_THREADS")]
    threads: Option<usize>,

    /// Number of independent burst jobs to submit.
    #[arg(long, default_value_t = 10_000)]
    jobs: usize,

    /// Length of the dependency chain submitted alongside the burst.
    #[arg(long, default_value_t = 64)]
    chain: usize,

    /// Per-job busy-work iterations.
    #[arg(long, default_value_t = 1_000)]
    spin: u64,
}

// ── Workloads ───────────────────────────────────────────────────────

/// Burst job: spins for a bit and bumps a shared counter.
struct BurstWork {
    spin: u64,
    done: Arc<AtomicUsize>,
}

impl Work for BurstWork {
    fn name(&self) -> &str {
        "burst"
    }

    fn execute(&self) -> Result<(), JobError> {
        let mut acc = 0u64;
        for i in 0..self.spin {
            acc = acc.wrapping_mul(6364136223846793005).wrapping_add(i);
        }
        std::hint::black_box(acc);
        self.done.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Chain link: records its position so the final order can be checked.
struct ChainWork {
    position: usize,
    progress: Arc<AtomicUsize>,
}

impl Work for ChainWork {
    fn name(&self) -> &str {
        "chain"
    }

    fn execute(&self) -> Result<(), JobError> {
        let seen = self.progress.swap(self.position + 1, Ordering::SeqCst);
        if seen != self.position {
            return Err(JobError::Failed(format!(
                "link {} ran after {} links, expected {}",
                self.position, seen, self.position
            )));
        }
        Ok(())
    }
}

// ── main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let config = DispatchConfig::from_file(path)?;
            info!(path = %path, "loaded dispatch config");
            config
        }
        None => DispatchConfig::default(),
    };
    if let Some(threads) = cli.threads {
        config.worker_threads = threads;
    }

    let pool = JobPool::new(&config)?;
    info!(
        workers = pool.worker_count(),
        burst = cli.jobs,
        chain = cli.chain,
        "submitting workload"
    );

    let start = Instant::now();
    let done = Arc::new(AtomicUsize::new(0));
    let progress = Arc::new(AtomicUsize::new(0));

    // dependency chain, wired before any link is submitted
    let links: Vec<_> = (0..cli.chain)
        .map(|position| {
            Job::new(
                Priority::High,
                ChainWork {
                    position,
                    progress: Arc::clone(&progress),
                },
            )
        })
        .collect();
    for pair in links.windows(2) {
        pair[1].add_dependency(&pair[0]);
    }
    for link in links.iter().rev() {
        pool.submit(link);
    }

    // mixed-priority burst
    for i in 0..cli.jobs {
        let priority = match i % 3 {
            0 => Priority::High,
            1 => Priority::Normal,
            _ => Priority::Low,
        };
        let job = Job::new(
            priority,
            BurstWork {
                spin: cli.spin,
                done: Arc::clone(&done),
            },
        );
        pool.submit(&job);
    }

    let expected = (cli.jobs + cli.chain) as u64;
    while pool.metrics().completed < expected {
        thread::sleep(Duration::from_millis(1));
    }
    let elapsed = start.elapsed();

    if progress.load(Ordering::SeqCst) != cli.chain {
        warn!("dependency chain did not run to completion in order");
    }

    let snapshot = pool.metrics();
    pool.shutdown();

    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        jobs_per_sec = (expected as f64 / elapsed.as_secs_f64()) as u64,
        "workload complete"
    );
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
