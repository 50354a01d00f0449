//! Cross-process advisory file locks

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;

use crate::{Error, Result};

/// An exclusive advisory lock on a file, released on drop.
///
/// The locked file is a dedicated sidecar (for example
/// `components.json.lock`) rather than the data file itself, because the
/// data file is replaced by rename on every write.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock on `path`, creating the file if needed.
    ///
    /// Contention is retried with exponential backoff until `timeout`
    /// elapses. A zero timeout makes exactly one attempt.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        let started = Instant::now();
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(10))
            .with_max_interval(Duration::from_millis(250))
            .with_max_elapsed_time(Some(timeout))
            .build();

        backoff::retry(policy, || {
            file.try_lock_exclusive().map_err(|e| {
                tracing::trace!(path = %path.display(), "lock contended: {e}");
                backoff::Error::transient(e)
            })
        })
        .map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
            waited: started.elapsed(),
        })?;

        tracing::debug!(path = %path.display(), "lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock as well; unlock eagerly anyway.
        let _ = FileExt::unlock(&self.file);
        tracing::debug!(path = %self.path.display(), "lock released");
    }
}
