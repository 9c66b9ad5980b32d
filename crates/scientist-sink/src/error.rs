//! Error types for scientist-sink

use thiserror::Error;

/// Result type for sink operations
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Errors that can occur while publishing observations
#[derive(Error, Debug)]
pub enum SinkError {
    /// Backing transport or store is unreachable
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// Sink refused the observation
    #[error("Observation rejected: {0}")]
    Rejected(String),

    /// Background queue has no free slot
    #[error("Publish queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Background worker has shut down
    #[error("Publish queue closed")]
    Closed,

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
