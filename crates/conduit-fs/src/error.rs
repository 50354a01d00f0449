//! Error types for conduit-fs

use std::path::PathBuf;
use std::time::Duration;

/// Result type for conduit-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in conduit-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock acquisition failed for {path} after {waited:?}")]
    LockFailed { path: PathBuf, waited: Duration },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The path the failed operation was working on.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. } | Self::LockFailed { path, .. } => path,
        }
    }
}
