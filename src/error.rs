//! Error types for Conflux.

use thiserror::Error;

/// Result type alias using Conflux's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Pipeline definition failed validation at build time.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// A stage failed while processing a message.
    #[error("stage '{stage}' failed: {reason}")]
    Stage {
        /// Name of the failing stage.
        stage: String,
        /// What went wrong.
        reason: String,
    },

    /// A worker pool rejected a job because its queue is full.
    #[error("worker pool '{0}': queue full")]
    QueueFull(String),

    /// A worker pool is no longer accepting jobs.
    #[error("worker pool '{0}' is shut down")]
    PoolClosed(String),

    /// Combining an aggregation group failed.
    #[error("aggregation failed: {0}")]
    Aggregation(String),

    /// The scheduler thread terminated abnormally.
    #[error("scheduler failed: {0}")]
    Scheduler(String),

    /// I/O error (e.g. spawning worker threads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor for stage failures.
    pub fn stage(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}
