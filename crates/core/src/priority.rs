use serde::{Deserialize, Serialize};

/// Job dispatch priority. Lower numeric value = dispatched first.
///
/// Priority is strict: no job at a lower level is dispatched while any job
/// at a higher level is ready. There is no aging, so a sustained backlog of
/// high-priority work can starve lower levels indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Frame-critical work, drained before anything else.
    High = 0,
    /// Default for most work.
    Normal = 1,
    /// Deferrable work, runs only when nothing else is ready.
    Low = 2,
}

impl Priority {
    /// Number of priority levels (one ready queue per level).
    pub const COUNT: usize = 3;

    /// All levels in dispatch order.
    pub const ALL: [Priority; Priority::COUNT] = [Priority::High, Priority::Normal, Priority::Low];

    /// Ready-queue index for this level.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}
