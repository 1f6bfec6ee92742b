//! Priority job dispatcher: dependency-counted jobs fanned out across a
//! fixed pool of pinned worker threads, with lock-free hand-off.
//!
//! Submitters create [`Job`]s, wire dependencies, and call
//! [`JobPool::submit`]. The coordinator drains ready jobs in strict priority
//! order into a fixed-capacity transaction channel; workers pull
//! transactions, execute, and report completion back through the scheduling
//! pass, which runs completion hooks and unblocks dependents.

pub mod channel;
pub mod metrics;
pub mod pool;

mod coordinator;
mod ready;
mod scheduler;
mod signal;
mod worker;

pub use channel::{SlotId, TransactionChannel};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use pool::JobPool;

// Re-export the submitter-facing vocabulary from jobwerk-core.
pub use jobwerk_core::{DispatchConfig, DispatchError, Job, JobError, Priority, Work};
