//! Component management for Conduit.
//!
//! Installs extension packages through Composer, discovers the service
//! providers they declare and records them in a persistent registry.
//!
//! Construction is explicit, leaf to root:
//!
//! ```no_run
//! use std::sync::Arc;
//! use conduit_components::{
//!     ComponentInstallationService, ComponentManager, InstallRequest, JsonFileStorage,
//!     SecurePackageInstaller, ServiceProviderDetector,
//! };
//!
//! # async fn demo() {
//! let manager = ComponentManager::new(JsonFileStorage::new("components.json"));
//! let service = ComponentInstallationService::new(
//!     manager,
//!     Arc::new(SecurePackageInstaller::new()),
//!     Arc::new(ServiceProviderDetector::new("vendor")),
//! );
//! let report = service
//!     .install(&InstallRequest::new("github", "jordanpartridge/github-zero", "^1.0"))
//!     .await;
//! assert!(report.is_success());
//! # }
//! ```

pub mod component;
pub mod config;
pub mod detector;
pub mod error;
pub mod identifier;
pub mod installer;
pub mod manager;
pub mod service;
pub mod storage;
pub mod verify;
pub mod version;

pub use component::{Component, ComponentMetadata, ComponentRegistry, EntryPoint};
pub use config::{CONFIG_FILENAME, ComponentDefinition, ConduitConfig};
pub use detector::{Detector, ServiceProviderDetector};
pub use error::{Error, Result};
pub use identifier::{PackageId, validate_component_name};
pub use installer::{
    InstallResult, Installer, OutputSink, OutputStream, SecurePackageInstaller, TracingSink,
};
pub use manager::ComponentManager;
pub use service::{
    ComponentInstallationService, InstallFailure, InstallReport, InstallRequest, InstallStage,
    InstallState,
};
pub use storage::{JsonFileStorage, MemoryStorage, RegistryGuard, Storage};
pub use verify::{
    Check, CommandSurfaceProbe, ConstraintProbe, HealthProbe, ProbeTarget, Verification,
};
pub use version::VersionConstraint;
