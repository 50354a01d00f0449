//! In-process stand-ins for the component capabilities.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use conduit_components::{
    Check, Detector, EntryPoint, Error, HealthProbe, InstallResult, Installer, OutputSink,
    OutputStream, PackageId, ProbeTarget, Result,
};

#[derive(Debug, Clone)]
enum Outcome {
    Exit { code: i32, stderr: String },
    Timeout,
}

/// Installer that never spawns anything and records what it was asked.
#[derive(Debug)]
pub struct StubInstaller {
    outcome: Outcome,
    calls: Mutex<Vec<String>>,
}

impl StubInstaller {
    /// Every install exits 0.
    pub fn succeeding() -> Self {
        Self::exiting(0, "")
    }

    /// Every install exits with `code` and prints `stderr`.
    pub fn exiting(code: i32, stderr: &str) -> Self {
        Self {
            outcome: Outcome::Exit {
                code,
                stderr: stderr.to_string(),
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every install times out.
    pub fn timing_out() -> Self {
        Self {
            outcome: Outcome::Timeout,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Packages passed to `install`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Installer for StubInstaller {
    async fn install(&self, package: &PackageId) -> Result<InstallResult> {
        self.calls.lock().unwrap().push(package.to_string());
        match &self.outcome {
            Outcome::Exit { code, stderr } => Ok(InstallResult {
                success: *code == 0,
                exit_code: Some(*code),
                stdout: format!("Installing {package}\n"),
                stderr: stderr.clone(),
                duration: Duration::from_millis(1),
            }),
            Outcome::Timeout => Err(Error::InstallTimeout {
                package: package.to_string(),
                timeout: Duration::from_secs(300),
            }),
        }
    }
}

/// Detector returning fixed entry points, or a discovery failure.
#[derive(Debug, Clone, Default)]
pub struct StubDetector {
    entry_points: Vec<EntryPoint>,
    version: Option<String>,
    failure: Option<String>,
}

impl StubDetector {
    pub fn with_entry_points(entry_points: &[&str]) -> Self {
        Self {
            entry_points: entry_points.iter().map(|e| EntryPoint::new(*e)).collect(),
            ..Self::default()
        }
    }

    /// Every detection fails with `EntryPointDiscovery`.
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }
}

impl Detector for StubDetector {
    fn detect(&self, package: &PackageId) -> Result<Vec<EntryPoint>> {
        match &self.failure {
            Some(reason) => Err(Error::EntryPointDiscovery {
                package: package.to_string(),
                path: PathBuf::from("vendor")
                    .join(package.vendor())
                    .join(package.name())
                    .join("composer.json"),
                reason: reason.clone(),
            }),
            None => Ok(self.entry_points.clone()),
        }
    }

    fn installed_version(&self, _package: &PackageId) -> Result<Option<String>> {
        Ok(self.version.clone())
    }
}

/// Probe with a fixed verdict that records the components it saw.
#[derive(Debug)]
pub struct StubProbe {
    name: String,
    passes: bool,
    seen: Mutex<Vec<(String, Vec<String>)>>,
}

impl StubProbe {
    pub fn passing(name: &str) -> Self {
        Self::new(name, true)
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name, false)
    }

    fn new(name: &str, passes: bool) -> Self {
        Self {
            name: name.to_string(),
            passes,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// `(component name, expected commands)` per check, in order.
    pub fn seen(&self) -> Vec<(String, Vec<String>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HealthProbe for StubProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, target: ProbeTarget<'_>) -> Check {
        self.seen.lock().unwrap().push((
            target.component.name.clone(),
            target.expected_commands.to_vec(),
        ));
        if self.passes {
            Check::pass(&self.name, "stub passed")
        } else {
            Check::fail(&self.name, "stub failed")
        }
    }
}

/// Output sink that keeps every line.
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(OutputStream, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(OutputStream, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn lines_on(&self, stream: OutputStream) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, line)| line)
            .collect()
    }
}

impl OutputSink for RecordingSink {
    fn line(&self, stream: OutputStream, line: &str) {
        self.lines.lock().unwrap().push((stream, line.to_string()));
    }
}
