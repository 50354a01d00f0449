//! Post-install health checks.
//!
//! Verification is advisory: a failed check is reported alongside the
//! registration, it never undoes it.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::component::Component;
use crate::detector::Detector;
use crate::version::VersionConstraint;

/// Default command listing the framework's commands.
pub const DEFAULT_LIST_COMMAND: [&str; 3] = ["php", "conduit", "list"];

/// Default timeout for the command listing.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// What a probe is asked to check.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTarget<'a> {
    pub component: &'a Component,
    /// Command names the component is expected to contribute.
    pub expected_commands: &'a [String],
}

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl Check {
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// All checks run against one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub checks: Vec<Check>,
}

impl Verification {
    /// `true` when every check passed (vacuously true with no probes).
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

/// A single health check against an installed component.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, target: ProbeTarget<'_>) -> Check;
}

/// Run every probe in order and collect the results.
pub async fn run_probes(probes: &[Arc<dyn HealthProbe>], target: ProbeTarget<'_>) -> Verification {
    let mut checks = Vec::with_capacity(probes.len());
    for probe in probes {
        let check = probe.check(target).await;
        if check.passed {
            tracing::debug!(probe = %check.name, component = %target.component.name, "{}", check.detail);
        } else {
            tracing::warn!(probe = %check.name, component = %target.component.name, "check failed: {}", check.detail);
        }
        checks.push(check);
    }
    Verification { checks }
}

/// Runs the framework's command listing and looks for the expected
/// command names in its output.
#[derive(Debug, Clone)]
pub struct CommandSurfaceProbe {
    command: Vec<String>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl Default for CommandSurfaceProbe {
    fn default() -> Self {
        Self::new(DEFAULT_LIST_COMMAND.iter().map(|s| s.to_string()).collect())
    }
}

impl CommandSurfaceProbe {
    pub const NAME: &'static str = "command-surface";

    /// `command` is an argument vector; the first element is the program.
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            working_dir: PathBuf::from("."),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    async fn listing(&self) -> std::result::Result<String, String> {
        let Some((program, args)) = self.command.split_first() else {
            return Err("no listing command configured".to_string());
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("failed to run '{}': {e}", self.command.join(" "))),
            Err(_) => {
                return Err(format!(
                    "'{}' timed out after {:?}",
                    self.command.join(" "),
                    self.timeout
                ));
            }
        };

        if !output.status.success() {
            return Err(format!(
                "'{}' exited with {}: {}",
                self.command.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl HealthProbe for CommandSurfaceProbe {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn check(&self, target: ProbeTarget<'_>) -> Check {
        let listing = match self.listing().await {
            Ok(listing) => listing,
            Err(reason) => return Check::fail(Self::NAME, reason),
        };

        let missing = missing_commands(&listing, target.expected_commands);
        if missing.is_empty() {
            Check::pass(
                Self::NAME,
                format!("{} expected command(s) available", target.expected_commands.len()),
            )
        } else {
            Check::fail(
                Self::NAME,
                format!("missing command(s): {}", missing.join(", ")),
            )
        }
    }
}

/// Expected names that do not appear as a whole word in `listing`.
fn missing_commands<'a>(listing: &str, expected: &'a [String]) -> Vec<&'a str> {
    expected
        .iter()
        .map(String::as_str)
        .filter(|name| !listing.split_whitespace().any(|word| word == *name))
        .collect()
}

/// Checks the installed version against the recorded constraint.
#[derive(Clone)]
pub struct ConstraintProbe {
    detector: Arc<dyn Detector>,
}

impl std::fmt::Debug for ConstraintProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintProbe").finish_non_exhaustive()
    }
}

impl ConstraintProbe {
    pub const NAME: &'static str = "version-constraint";

    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl HealthProbe for ConstraintProbe {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn check(&self, target: ProbeTarget<'_>) -> Check {
        let component = target.component;
        let constraint = match VersionConstraint::parse(&component.version_constraint) {
            Ok(constraint) => constraint,
            Err(e) => return Check::fail(Self::NAME, e.to_string()),
        };

        match self.detector.installed_version(&component.package_id) {
            Ok(Some(version)) if constraint.satisfies(&version) => Check::pass(
                Self::NAME,
                format!("{version} satisfies {constraint}"),
            ),
            Ok(Some(version)) => Check::fail(
                Self::NAME,
                format!("{version} does not satisfy {constraint}"),
            ),
            Ok(None) => Check::pass(Self::NAME, "installed version unknown; skipped"),
            Err(e) => Check::fail(Self::NAME, e.to_string()),
        }
    }
}
