//! Error kinds for the deployment pipeline.
//!
//! Each variant maps to one failure class with its own handling policy:
//! configuration and runtime errors abort, a health-gate timeout triggers
//! rollback of the new containers, and publish errors after a successful
//! swap are reported without undoing the deployment.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid invocation or unusable declarative input. Nothing has been
    /// mutated when this is raised.
    #[error("{0}")]
    Config(String),

    /// A compose file could not be read or parsed.
    #[error("compose file {path}: {message}")]
    Compose { path: PathBuf, message: String },

    /// The container runtime refused or failed an operation.
    #[error("container runtime: {0}")]
    Runtime(String),

    /// Not all gated containers became healthy before the deadline.
    #[error("timed out after {seconds}s waiting for containers to become healthy")]
    HealthGateTimeout { seconds: u64 },

    /// The routing document could not be written or renamed into place.
    #[error("failed to publish routing configuration at {path}: {source}")]
    Publish {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another deployment of the same service holds the lease.
    #[error("deployment of '{service}' already in progress (lock file {path})")]
    LockHeld { service: String, path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Docker(#[from] bollard::errors::Error),
}

impl Error {
    pub fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Publish failures are reported at warning level and must not be
    /// confused with a failed deployment.
    pub fn is_publish(&self) -> bool {
        matches!(self, Error::Publish { .. })
    }
}
