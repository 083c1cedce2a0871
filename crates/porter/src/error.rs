//! Error types for the worker pool.
//!
//! Registry operations are infallible from the controller's point of view, so
//! [`Error`] only covers constructing a pool. Failures inside a running worker
//! are described by [`WorkerError`] and surface to the controller as
//! [`Outbound::WorkerFailed`](crate::Outbound::WorkerFailed) events rather
//! than as return values.
//!
//! ## Error Cases
//! - `NoRuntime`: the pool was built outside of a Tokio runtime.
//! - `InvalidConfig`: a [`PoolConfig`](crate::PoolConfig) value was rejected.

use std::process::ExitStatus;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised while building a [`Pool`](crate::Pool).
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// No Tokio runtime is available to spawn workers on.
    #[error("No Tokio runtime available: the pool must be created inside a runtime context")]
    NoRuntime,

    /// The pool configuration was rejected.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },
}

/// Reasons a single worker execution unit stopped abnormally.
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    /// I/O with the worker failed (spawning the process, pipes, etc).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be encoded or decoded at the worker boundary.
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A line could not be framed on a worker process pipe.
    #[error("Framing error: {0}")]
    Framing(#[from] tokio_util::codec::LinesCodecError),

    /// The worker process exited on its own.
    #[error("Worker exited with {status}")]
    Exited { status: ExitStatus },

    /// The worker reported a failure of its own.
    #[error("Worker failed: {reason}")]
    Failed { reason: String },
}

impl WorkerError {
    /// Builds a [`WorkerError::Failed`] from anything printable.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}
