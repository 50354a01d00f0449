//! `conduit.toml` configuration.
//!
//! Every section is optional:
//!
//! ```toml
//! [storage]
//! registry = "/var/lib/conduit/components.json"
//! lock_timeout_secs = 10
//!
//! [installer]
//! binary = "composer"
//! timeout_secs = 300
//! working_dir = "."
//!
//! [discovery]
//! vendor_dir = "vendor"
//! registration_key = "laravel"
//!
//! [verify]
//! command = ["php", "conduit", "list"]
//! timeout_secs = 30
//!
//! [components.github]
//! package = "jordanpartridge/github-zero"
//! version = "^1.0"
//! commands = ["repos", "clone"]
//! description = "GitHub integration"
//! ```
//!
//! Keys of a `[components.<name>]` table other than `package`, `version`
//! and `commands` become the component's metadata.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::detector::{DEFAULT_REGISTRATION_KEY, DEFAULT_VENDOR_DIR, Detector, ServiceProviderDetector};
use crate::error::{Error, Result};
use crate::installer::{DEFAULT_BINARY, SecurePackageInstaller};
use crate::service::InstallRequest;
use crate::storage::JsonFileStorage;
use crate::verify::{CommandSurfaceProbe, ConstraintProbe, DEFAULT_LIST_COMMAND, HealthProbe};

/// Conventional configuration filename.
pub const CONFIG_FILENAME: &str = "conduit.toml";

/// Constraint used when a component definition names none.
pub const DEFAULT_VERSION_CONSTRAINT: &str = "^1.0";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConduitConfig {
    pub storage: StorageConfig,
    pub installer: InstallerConfig,
    pub discovery: DiscoveryConfig,
    pub verify: VerifyConfig,
    pub components: BTreeMap<String, ComponentDefinition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Registry file; the platform data directory when unset.
    pub registry: Option<PathBuf>,
    pub lock_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            registry: None,
            lock_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub binary: String,
    pub timeout_secs: u64,
    /// Project root the package manager runs in.
    pub working_dir: PathBuf,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            timeout_secs: 300,
            working_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Relative paths are resolved against the installer's working directory.
    pub vendor_dir: PathBuf,
    pub registration_key: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            vendor_dir: PathBuf::from(DEFAULT_VENDOR_DIR),
            registration_key: DEFAULT_REGISTRATION_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_LIST_COMMAND.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 30,
        }
    }
}

/// A `[components.<name>]` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ComponentDefinition {
    pub package: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default, flatten)]
    pub fields: BTreeMap<String, toml::Value>,
}

fn default_version() -> String {
    DEFAULT_VERSION_CONSTRAINT.to_string()
}

impl ComponentDefinition {
    /// Install request for this definition under `name`.
    pub fn request(&self, name: &str) -> InstallRequest {
        let fields: Map<String, Value> = self
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), toml_to_json(value)))
            .collect();
        InstallRequest::new(name, &self.package, &self.version)
            .with_fields(fields)
            .with_expected_commands(self.commands.clone())
    }
}

/// Components known without any configuration.
pub fn builtin_components() -> BTreeMap<String, ComponentDefinition> {
    let mut github_fields = BTreeMap::new();
    github_fields.insert(
        "description".to_string(),
        toml::Value::String("GitHub integration".to_string()),
    );

    BTreeMap::from([(
        "github".to_string(),
        ComponentDefinition {
            package: "jordanpartridge/github-zero".to_string(),
            version: default_version(),
            commands: vec!["repos".to_string(), "clone".to_string()],
            fields: github_fields,
        },
    )])
}

impl ConduitConfig {
    /// Parse and validate `content`; `path` is only used in errors.
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// Load from `path`, which must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = conduit_fs::io::read_text(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&content, path)?;
        tracing::debug!(path = %path.display(), components = config.components.len(), "configuration loaded");
        Ok(config)
    }

    /// Load from `path`, or the defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no configuration file; using defaults");
            Ok(Self::default())
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |reason: &str| Error::Config {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if self.installer.binary.trim().is_empty() {
            return Err(invalid("installer.binary must not be empty"));
        }
        if self.installer.timeout_secs == 0 {
            return Err(invalid("installer.timeout_secs must be greater than zero"));
        }
        if self.verify.timeout_secs == 0 {
            return Err(invalid("verify.timeout_secs must be greater than zero"));
        }
        if self.verify.command.is_empty() {
            return Err(invalid("verify.command must name a program"));
        }
        if self.discovery.registration_key.trim().is_empty() {
            return Err(invalid("discovery.registration_key must not be empty"));
        }
        for (name, definition) in &self.components {
            if definition.package.trim().is_empty() {
                return Err(invalid(&format!("components.{name}.package must not be empty")));
            }
        }
        Ok(())
    }

    /// Configured definition for `name`, falling back to the built-ins.
    pub fn component(&self, name: &str) -> Result<ComponentDefinition> {
        self.components
            .get(name)
            .cloned()
            .or_else(|| builtin_components().remove(name))
            .ok_or_else(|| Error::UnknownComponent(name.to_string()))
    }

    pub fn registry_path(&self) -> Option<PathBuf> {
        self.storage
            .registry
            .clone()
            .or_else(JsonFileStorage::default_path)
    }

    pub fn storage(&self) -> Result<JsonFileStorage> {
        let path = self.registry_path().ok_or_else(|| Error::Config {
            path: PathBuf::from(CONFIG_FILENAME),
            reason: "no data directory on this platform; set storage.registry".to_string(),
        })?;
        Ok(JsonFileStorage::new(path)
            .with_lock_timeout(Duration::from_secs(self.storage.lock_timeout_secs)))
    }

    pub fn installer(&self) -> SecurePackageInstaller {
        SecurePackageInstaller::new()
            .with_binary(&self.installer.binary)
            .with_working_dir(&self.installer.working_dir)
            .with_timeout(Duration::from_secs(self.installer.timeout_secs))
    }

    pub fn detector(&self) -> ServiceProviderDetector {
        ServiceProviderDetector::new(self.installer.working_dir.join(&self.discovery.vendor_dir))
            .with_registration_key(&self.discovery.registration_key)
    }

    /// Command surface probe followed by the constraint probe.
    pub fn probes(&self, detector: Arc<dyn Detector>) -> Vec<Arc<dyn HealthProbe>> {
        vec![
            Arc::new(
                CommandSurfaceProbe::new(self.verify.command.clone())
                    .with_working_dir(&self.installer.working_dir)
                    .with_timeout(Duration::from_secs(self.verify.timeout_secs)),
            ),
            Arc::new(ConstraintProbe::new(detector)),
        ]
    }
}

fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(key, value)| (key.clone(), toml_to_json(value)))
                .collect(),
        ),
    }
}
