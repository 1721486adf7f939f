//! Container runtime error types.

use thiserror::Error;

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors that can occur during container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The engine command failed.
    #[error("container {command} failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The engine reported success but printed no container id.
    #[error("engine output contained no container id")]
    MissingContainerId,

    /// The operation was aborted by a shutdown request.
    #[error("container start aborted by shutdown")]
    Cancelled,

    /// Spawning the engine binary failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
