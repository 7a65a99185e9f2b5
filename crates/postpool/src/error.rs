//! Error types for the worker pool.
//!
//! Two families of failure exist and they travel on different paths:
//!
//! - [`Error`] is returned from pool and coordinator operations. A
//!   configuration error aborts a run before any worker starts; the remaining
//!   variants describe lifecycle failures of the pool itself.
//! - [`InvocationError`] describes a single item whose external operation
//!   could not be run to completion. It never escapes a worker as a `Result`;
//!   it is carried inside the item's [`WorkResult`](crate::WorkResult) so the
//!   coordinator's accounting always terminates.

use crate::item::WorkerId;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for pool lifecycle and configuration.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The supplied configuration cannot produce a working pool.
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    /// The operating system refused to start a worker thread.
    #[error("Failed to spawn {worker}: {source}")]
    WorkerSpawn {
        worker: WorkerId,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread terminated by panicking outside of item processing.
    #[error("{worker} panicked")]
    WorkerPanicked { worker: WorkerId },

    /// Internal channel failure, e.g. every result sender is gone.
    #[error("Channel error: {context}")]
    ChannelError { context: String },
}

/// Why the external operation for one item did not run to completion.
#[derive(thiserror::Error, Debug)]
pub enum InvocationError {
    /// The program could not be started (missing executable, permissions).
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program started but waiting on it failed.
    #[error("failed to wait on `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program exceeded its timeout and could not be killed.
    #[error("failed to kill `{program}` after timeout: {source}")]
    Kill {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The processor panicked while handling the item.
    #[error("processor panicked: {message}")]
    Panicked { message: String },
}
