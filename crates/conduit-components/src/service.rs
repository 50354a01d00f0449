//! Install orchestration: validate, install, discover, register, verify.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::component::{Component, ComponentMetadata};
use crate::detector::Detector;
use crate::error::{Error, Result};
use crate::identifier::{PackageId, validate_component_name};
use crate::installer::{InstallResult, Installer};
use crate::manager::ComponentManager;
use crate::storage::Storage;
use crate::verify::{HealthProbe, ProbeTarget, Verification, run_probes};

/// A stage of an install attempt that can fail.
///
/// Verification is advisory and never fails an attempt, so it has no
/// stage here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallStage {
    Validate,
    Install,
    Discover,
    Register,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallStage::Validate => "validate",
            InstallStage::Install => "install",
            InstallStage::Discover => "discover",
            InstallStage::Register => "register",
        };
        f.write_str(name)
    }
}

/// States visited by one install attempt.
///
/// `Idle → Validating → Installing → Discovering → Registering →
/// Verifying → Succeeded`, or `Failed(stage)` from any working state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    Validating,
    Installing,
    Discovering,
    Registering,
    Verifying,
    Succeeded,
    Failed(InstallStage),
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallState::Succeeded | InstallState::Failed(_))
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallState::Idle => f.write_str("idle"),
            InstallState::Validating => f.write_str("validating"),
            InstallState::Installing => f.write_str("installing"),
            InstallState::Discovering => f.write_str("discovering"),
            InstallState::Registering => f.write_str("registering"),
            InstallState::Verifying => f.write_str("verifying"),
            InstallState::Succeeded => f.write_str("succeeded"),
            InstallState::Failed(stage) => write!(f, "failed({stage})"),
        }
    }
}

/// What to install and how to record it.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRequest {
    pub name: String,
    pub package_id: String,
    pub version_constraint: String,
    /// Descriptive fields stored as component metadata.
    pub fields: Map<String, Value>,
    /// Command names checked by the command surface probe.
    pub expected_commands: Vec<String>,
}

impl InstallRequest {
    pub fn new(
        name: impl Into<String>,
        package_id: impl Into<String>,
        version_constraint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            package_id: package_id.into(),
            version_constraint: version_constraint.into(),
            fields: Map::new(),
            expected_commands: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn with_expected_commands(mut self, commands: Vec<String>) -> Self {
        self.expected_commands = commands;
        self
    }
}

/// The stage an attempt stopped at and why.
#[derive(Debug)]
pub struct InstallFailure {
    pub stage: InstallStage,
    pub error: Error,
}

impl fmt::Display for InstallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.error)
    }
}

/// Everything observed during one install attempt.
#[derive(Debug)]
pub struct InstallReport {
    pub name: String,
    pub package_id: String,
    /// States in the order they were entered, starting at `Idle`.
    pub history: Vec<InstallState>,
    pub install: Option<InstallResult>,
    pub component: Option<Component>,
    pub verification: Option<Verification>,
    pub failure: Option<InstallFailure>,
}

impl InstallReport {
    fn new(request: &InstallRequest) -> Self {
        Self {
            name: request.name.clone(),
            package_id: request.package_id.clone(),
            history: vec![InstallState::Idle],
            install: None,
            component: None,
            verification: None,
            failure: None,
        }
    }

    /// The last state entered.
    pub fn state(&self) -> InstallState {
        self.history.last().copied().unwrap_or(InstallState::Idle)
    }

    pub fn is_success(&self) -> bool {
        self.state() == InstallState::Succeeded
    }

    /// The package was installed but never made it into the registry.
    ///
    /// Nothing is rolled back; the caller decides whether to remove the
    /// package or retry registration.
    pub fn is_diverged(&self) -> bool {
        matches!(
            self.state(),
            InstallState::Failed(InstallStage::Discover | InstallStage::Register)
        )
    }

    /// Whether the component was registered and every probe passed.
    pub fn is_healthy(&self) -> bool {
        self.is_success() && self.verification.as_ref().is_none_or(Verification::passed)
    }

    fn enter(&mut self, state: InstallState) {
        tracing::debug!(component = %self.name, from = %self.state(), to = %state, "install state");
        self.history.push(state);
    }

    fn fail(mut self, stage: InstallStage, error: Error) -> Self {
        self.enter(InstallState::Failed(stage));
        if self.is_diverged() {
            tracing::warn!(
                component = %self.name,
                package = %self.package_id,
                "package installed but not registered: {error}"
            );
        } else {
            tracing::debug!(component = %self.name, stage = %stage, "install failed: {error}");
        }
        self.failure = Some(InstallFailure { stage, error });
        self
    }
}

/// Drives install attempts end to end.
pub struct ComponentInstallationService<S> {
    manager: ComponentManager<S>,
    installer: Arc<dyn Installer>,
    detector: Arc<dyn Detector>,
    probes: Vec<Arc<dyn HealthProbe>>,
}

impl<S: Storage> ComponentInstallationService<S> {
    pub fn new(
        manager: ComponentManager<S>,
        installer: Arc<dyn Installer>,
        detector: Arc<dyn Detector>,
    ) -> Self {
        Self {
            manager,
            installer,
            detector,
            probes: Vec::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn with_probes(mut self, probes: impl IntoIterator<Item = Arc<dyn HealthProbe>>) -> Self {
        self.probes.extend(probes);
        self
    }

    pub fn manager(&self) -> &ComponentManager<S> {
        &self.manager
    }

    /// Run one install attempt.
    ///
    /// Failures are recorded in the report rather than returned; a new
    /// attempt is a new call.
    pub async fn install(&self, request: &InstallRequest) -> InstallReport {
        let mut report = InstallReport::new(request);

        report.enter(InstallState::Validating);
        let package = match self.validate(request) {
            Ok(package) => package,
            Err(e) => return report.fail(InstallStage::Validate, e),
        };

        report.enter(InstallState::Installing);
        match self.installer.install(&package).await {
            Ok(result) if result.success => report.install = Some(result),
            Ok(result) => {
                let error = Error::InstallProcess {
                    package: package.to_string(),
                    exit_code: result.exit_code,
                    stderr: result.stderr.trim().to_string(),
                };
                report.install = Some(result);
                return report.fail(InstallStage::Install, error);
            }
            Err(e) => return report.fail(InstallStage::Install, e),
        }

        report.enter(InstallState::Discovering);
        let entry_points = match self.detector.detect(&package) {
            Ok(entry_points) => entry_points,
            Err(e) => return report.fail(InstallStage::Discover, e),
        };

        report.enter(InstallState::Registering);
        let metadata = ComponentMetadata::new(package)
            .with_entry_points(entry_points)
            .with_fields(request.fields.clone());
        let component =
            match self
                .manager
                .register(&request.name, metadata, &request.version_constraint)
            {
                Ok(component) => component,
                Err(e) => return report.fail(InstallStage::Register, e),
            };

        report.enter(InstallState::Verifying);
        let verification = run_probes(
            &self.probes,
            ProbeTarget {
                component: &component,
                expected_commands: &request.expected_commands,
            },
        )
        .await;
        if !verification.passed() {
            tracing::warn!(
                component = %component.name,
                failed = verification.failures().count(),
                "component registered but verification failed"
            );
        }
        report.component = Some(component);
        report.verification = Some(verification);

        report.enter(InstallState::Succeeded);
        tracing::info!(component = %report.name, package = %report.package_id, "component installed");
        report
    }

    /// Re-run the health probes against a registered component.
    pub async fn verify(&self, name: &str, expected_commands: &[String]) -> Result<Verification> {
        let component = self
            .manager
            .get(name)?
            .ok_or_else(|| Error::UnknownComponent(name.to_string()))?;
        Ok(run_probes(
            &self.probes,
            ProbeTarget {
                component: &component,
                expected_commands,
            },
        )
        .await)
    }

    fn validate(&self, request: &InstallRequest) -> Result<PackageId> {
        validate_component_name(&request.name)?;
        self.installer.validate(&request.package_id)
    }
}
