//! Package installation through the external package manager.
//!
//! The package manager runs as a discrete argument vector
//! (`<binary> require <vendor/name>`), never through a shell, so the
//! validated [`PackageId`] is the only caller-supplied argument.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::identifier::PackageId;

/// Default package manager binary.
pub const DEFAULT_BINARY: &str = "composer";

/// Default install timeout.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of a package manager run that exited on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    /// `true` iff the process exited with status 0.
    pub success: bool,
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Which pipe an output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Receives package manager output as it is produced.
pub trait OutputSink: Send + Sync {
    fn line(&self, stream: OutputStream, line: &str);
}

/// Forwards output lines as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn line(&self, stream: OutputStream, line: &str) {
        match stream {
            OutputStream::Stdout => tracing::info!(target: "conduit::install", "{line}"),
            OutputStream::Stderr => tracing::warn!(target: "conduit::install", "{line}"),
        }
    }
}

/// Validates package identifiers and installs packages.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Check `package_id` against the identifier grammar.
    fn validate(&self, package_id: &str) -> Result<PackageId> {
        PackageId::parse(package_id)
    }

    /// Install a validated package.
    ///
    /// A process that exits on its own yields `Ok` whatever its status;
    /// inspect [`InstallResult::success`].
    async fn install(&self, package: &PackageId) -> Result<InstallResult>;
}

/// Runs `<binary> require <package>` with a timeout.
#[derive(Clone)]
pub struct SecurePackageInstaller {
    binary: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
    sink: Arc<dyn OutputSink>,
}

impl fmt::Debug for SecurePackageInstaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurePackageInstaller")
            .field("binary", &self.binary)
            .field("working_dir", &self.working_dir)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for SecurePackageInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurePackageInstaller {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            working_dir: PathBuf::from("."),
            timeout: DEFAULT_INSTALL_TIMEOUT,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn spawn_error(&self, package: &PackageId, err: std::io::Error) -> Error {
        let stderr = if err.kind() == ErrorKind::NotFound {
            format!(
                "'{}' was not found on PATH\n  Install: https://getcomposer.org/download/",
                self.binary.display()
            )
        } else {
            format!("failed to start '{}': {err}", self.binary.display())
        };
        Error::InstallProcess {
            package: package.to_string(),
            exit_code: None,
            stderr,
        }
    }
}

#[async_trait]
impl Installer for SecurePackageInstaller {
    async fn install(&self, package: &PackageId) -> Result<InstallResult> {
        let started = Instant::now();
        if !self.working_dir.is_dir() {
            return Err(Error::InstallProcess {
                package: package.to_string(),
                exit_code: None,
                stderr: format!(
                    "working directory {} does not exist",
                    self.working_dir.display()
                ),
            });
        }

        let mut cmd = Command::new(&self.binary);
        cmd.arg("require")
            .arg(package.as_str())
            .current_dir(&self.working_dir)
            .env("COMPOSER_NO_INTERACTION", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            binary = %self.binary.display(),
            package = %package,
            working_dir = %self.working_dir.display(),
            "spawning package manager"
        );
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(package, e))?;

        let mut stdout = child
            .stdout
            .take()
            .map(|out| forward_lines(out, OutputStream::Stdout, Arc::clone(&self.sink)));
        let mut stderr = child
            .stderr
            .take()
            .map(|err| forward_lines(err, OutputStream::Stderr, Arc::clone(&self.sink)));

        // The deadline covers draining the pipes too: a grandchild that
        // inherited them keeps the readers open after the child exits.
        let run = tokio::time::timeout(self.timeout, async {
            let status = child.wait().await;
            let out = collect(stdout.as_mut(), OutputStream::Stdout).await;
            let err = collect(stderr.as_mut(), OutputStream::Stderr).await;
            (status, out, err)
        })
        .await;

        let (status, out, err) = match run {
            Ok((Ok(status), out, err)) => (status, out, err),
            Ok((Err(e), _, _)) => {
                return Err(Error::InstallProcess {
                    package: package.to_string(),
                    exit_code: None,
                    stderr: format!("failed to wait for '{}': {e}", self.binary.display()),
                });
            }
            Err(_) => {
                if let Ok(None) = child.try_wait() {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(package = %package, "failed to kill package manager: {e}");
                    }
                }
                for reader in [stdout, stderr].into_iter().flatten() {
                    reader.abort();
                }
                tracing::warn!(package = %package, timeout = ?self.timeout, "install timed out");
                return Err(Error::InstallTimeout {
                    package: package.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let result = InstallResult {
            success: status.success(),
            exit_code: status.code(),
            stdout: out,
            stderr: err,
            duration: started.elapsed(),
        };
        tracing::debug!(
            package = %package,
            exit_code = ?result.exit_code,
            duration = ?result.duration,
            "package manager exited"
        );
        Ok(result)
    }
}

/// Forward each line to `sink` while accumulating the full text.
///
/// Bytes that are not UTF-8 are replaced rather than ending the read, so
/// the pipe is always drained to EOF.
fn forward_lines<R>(reader: R, stream: OutputStream, sink: Arc<dyn OutputSink>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).split(b'\n');
        let mut captured = String::new();
        loop {
            match lines.next_segment().await {
                Ok(Some(raw)) => {
                    let bytes = raw.strip_suffix(b"\r").unwrap_or(&raw[..]);
                    let line = String::from_utf8_lossy(bytes);
                    sink.line(stream, &line);
                    captured.push_str(&line);
                    captured.push('\n');
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(%stream, "failed to read package manager output: {e}");
                    break;
                }
            }
        }
        captured
    })
}

async fn collect(handle: Option<&mut JoinHandle<String>>, stream: OutputStream) -> String {
    match handle {
        Some(handle) => match handle.await {
            Ok(captured) => captured,
            Err(e) => {
                tracing::warn!(%stream, "output reader failed: {e}");
                String::new()
            }
        },
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_uses_identifier_grammar() {
        let installer = SecurePackageInstaller::new();
        assert_eq!(
            installer.validate("vendor/demo").unwrap().as_str(),
            "vendor/demo"
        );
        assert!(matches!(
            installer.validate("vendor/demo; rm -rf /"),
            Err(Error::InvalidPackageIdentifier { .. })
        ));
    }

    #[test]
    fn defaults() {
        let installer = SecurePackageInstaller::default();
        assert_eq!(installer.binary(), Path::new("composer"));
        assert_eq!(installer.timeout(), Duration::from_secs(300));
        assert_eq!(installer.working_dir(), Path::new("."));
    }

    #[tokio::test]
    async fn missing_binary_reports_hint() {
        let installer =
            SecurePackageInstaller::new().with_binary("conduit-no-such-package-manager-binary");
        let package = PackageId::parse("vendor/demo").unwrap();

        let err = installer.install(&package).await.unwrap_err();
        match err {
            Error::InstallProcess {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, None);
                assert!(stderr.contains("not found on PATH"), "{stderr}");
            }
            other => panic!("expected InstallProcess, got {other:?}"),
        }
    }

    #[test]
    fn output_stream_display() {
        assert_eq!(OutputStream::Stdout.to_string(), "stdout");
        assert_eq!(OutputStream::Stderr.to_string(), "stderr");
    }
}
