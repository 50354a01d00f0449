//! Error types for conduit-components

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while managing components.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Package identifier failed validation; nothing was spawned.
    #[error("invalid package identifier '{id}': {reason}")]
    InvalidPackageIdentifier { id: String, reason: String },

    /// Component name failed validation.
    #[error("invalid component name '{name}': {reason}")]
    InvalidComponentName { name: String, reason: String },

    /// The package manager did not finish within the timeout and was killed.
    #[error("installing '{package}' timed out after {timeout:?}; the process was terminated")]
    InstallTimeout { package: String, timeout: Duration },

    /// The package manager could not be run or exited unsuccessfully.
    #[error("installing '{package}' failed{}: {stderr}", exit_suffix(.exit_code))]
    InstallProcess {
        package: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Package metadata exists but cannot be read as an extension manifest.
    #[error("malformed package metadata for '{package}' at {path}: {reason}")]
    EntryPointDiscovery {
        package: String,
        path: PathBuf,
        reason: String,
    },

    /// Malformed semantic version range.
    #[error("invalid version constraint '{constraint}': {reason}")]
    VersionConstraint { constraint: String, reason: String },

    /// Persisted registry cannot be parsed into valid entries.
    #[error("component registry at {path} is corrupt: {reason}")]
    StorageCorruption { path: PathBuf, reason: String },

    /// The registry exists but could not be read.
    #[error("failed to read component registry at {path}: {source}")]
    StorageRead {
        path: PathBuf,
        #[source]
        source: conduit_fs::Error,
    },

    /// Persisting the registry failed; the previous file is intact.
    #[error("failed to write component registry at {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: conduit_fs::Error,
    },

    /// Another process held the registry lock for too long.
    #[error("component registry is locked by another process ({path})")]
    RegistryLocked { path: PathBuf },

    /// Configuration file could not be read or parsed.
    #[error("invalid configuration at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// Component is neither configured nor registered.
    #[error("unknown component: {0}")]
    UnknownComponent(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {c})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
