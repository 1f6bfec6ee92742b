pub mod config;
pub mod error;
pub mod job;
pub mod priority;

pub use config::DispatchConfig;
pub use error::DispatchError;
pub use job::{Job, JobError, Work};
pub use priority::Priority;
