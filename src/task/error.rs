//! Errors produced by the task manager and by task work.

use std::io;

use thiserror::Error;

/// Failure of a task or of the task pool.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The work reported a failure.
    #[error("{0}")]
    Failed(String),
    /// The work panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The pool no longer accepts work.
    #[error("task pool is shut down")]
    PoolShutDown,
    /// The task was dropped before reporting an outcome.
    #[error("task abandoned before completion")]
    Abandoned,
    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

impl TaskError {
    /// Build a [`TaskError::Failed`] from any message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self { Self::Failed(message.into()) }
}
