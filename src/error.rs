//! Error taxonomy
//!
//! Configuration and entropy failures are fatal and travel to the process
//! boundary. Backend failures are load-test noise: operations absorb them and
//! the round carries on.

use thiserror::Error;

/// Errors produced by the bomber core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration value
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation name not present in the registry
    #[error("configuration error: unknown operation `{0}`")]
    UnknownOperation(String),

    /// OS randomness source could not be opened or read fully
    #[error("entropy source unavailable: {0}")]
    EntropySourceUnavailable(#[source] rand::Error),

    /// A backend call failed or timed out
    #[error("backend call failed: {0}")]
    Backend(String),

    /// The requested key does not exist on the backend
    #[error("object not found: {0}")]
    NotFound(String),

    /// No backend routes are currently known
    #[error("routing table is empty")]
    EmptyRoutingTable,

    /// A worker thread panicked instead of returning
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    /// The OS refused to start a thread
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl Error {
    /// Shorthand for building a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// True for errors that must stop the process before any load is generated
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::UnknownOperation(_))
    }

    /// True for per-operation failures that are absorbed inside a round
    pub fn is_backend_noise(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::NotFound(_) | Self::EmptyRoutingTable)
    }
}
