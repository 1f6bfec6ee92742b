use thiserror::Error;

/// Errors surfaced by the dispatcher to its callers.
///
/// Misuse (double enqueue, corrupt dependency counts) is a programming
/// error and asserts instead; resource exhaustion inside the engine is
/// handled by backpressure and never reaches this type.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}
