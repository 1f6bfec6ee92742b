use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Dispatcher configuration, typically parsed from TOML.
///
/// All values are fixed at pool-creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of worker threads. 0 = logical CPU count.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Transaction channel capacity (in-flight job bound).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Ready-queue capacity per priority level.
    #[serde(default = "default_ready_capacity")]
    pub ready_capacity: usize,
    /// Pin each worker to a CPU core. Ignored when core ids are unavailable.
    #[serde(default = "default_pin_workers")]
    pub pin_workers: bool,
    /// Worker thread stack size in bytes. 0 = platform default.
    #[serde(default)]
    pub worker_stack_size: usize,
}

fn default_worker_threads() -> usize { 0 }
fn default_channel_capacity() -> usize { 64 }
fn default_ready_capacity() -> usize { 1024 }
fn default_pin_workers() -> bool { true }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            channel_capacity: default_channel_capacity(),
            ready_capacity: default_ready_capacity(),
            pin_workers: default_pin_workers(),
            worker_stack_size: 0,
        }
    }
}

impl DispatchConfig {
    /// Resolve worker thread count (0 means one per logical CPU).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, DispatchError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DispatchError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }
}
