//! Entry point discovery from installed package metadata.
//!
//! Composer packages declare the service providers the host framework
//! should activate under `extra.<framework>.providers` in their
//! `composer.json`:
//!
//! ```json
//! {
//!     "name": "vendor/demo",
//!     "extra": {
//!         "laravel": {
//!             "providers": ["Demo\\Provider"]
//!         }
//!     }
//! }
//! ```
//!
//! The detector reads that declaration instead of loading any code.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::component::EntryPoint;
use crate::error::{Error, Result};
use crate::identifier::PackageId;

/// Default vendor directory, relative to the project root.
pub const DEFAULT_VENDOR_DIR: &str = "vendor";

/// Default `extra` section holding the provider list.
pub const DEFAULT_REGISTRATION_KEY: &str = "laravel";

/// Discovers the entry points an installed package contributes.
pub trait Detector: Send + Sync {
    /// Entry points in declaration order, without duplicates.
    ///
    /// A package without metadata or without a provider declaration has
    /// no entry points; that is not an error.
    fn detect(&self, package: &PackageId) -> Result<Vec<EntryPoint>>;

    /// Installed version, when the metadata records one.
    fn installed_version(&self, _package: &PackageId) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Reads provider declarations from Composer metadata under a vendor directory.
#[derive(Debug, Clone)]
pub struct ServiceProviderDetector {
    vendor_dir: PathBuf,
    registration_key: String,
}

impl Default for ServiceProviderDetector {
    fn default() -> Self {
        Self::new(DEFAULT_VENDOR_DIR)
    }
}

/// Metadata document and the file it came from.
struct Manifest {
    path: PathBuf,
    value: Value,
}

impl ServiceProviderDetector {
    pub fn new(vendor_dir: impl Into<PathBuf>) -> Self {
        Self {
            vendor_dir: vendor_dir.into(),
            registration_key: DEFAULT_REGISTRATION_KEY.to_string(),
        }
    }

    pub fn with_registration_key(mut self, key: impl Into<String>) -> Self {
        self.registration_key = key.into();
        self
    }

    pub fn vendor_dir(&self) -> &Path {
        &self.vendor_dir
    }

    pub fn registration_key(&self) -> &str {
        &self.registration_key
    }

    /// `<vendor>/<vendor-name>/<package>/composer.json`
    pub fn package_manifest_path(&self, package: &PackageId) -> PathBuf {
        self.vendor_dir
            .join(package.vendor())
            .join(package.name())
            .join("composer.json")
    }

    /// `<vendor>/composer/installed.json`
    pub fn installed_index_path(&self) -> PathBuf {
        self.vendor_dir.join("composer").join("installed.json")
    }

    fn package_manifest(&self, package: &PackageId) -> Result<Option<Manifest>> {
        let path = self.package_manifest_path(package);
        let Some(value) = read_json(package, &path)? else {
            return Ok(None);
        };
        if !value.is_object() {
            return Err(malformed(package, &path, "composer.json is not an object"));
        }
        Ok(Some(Manifest { path, value }))
    }

    /// The package's entry in `installed.json`, in either the Composer 1
    /// array form or the Composer 2 `{"packages": [...]}` form.
    fn installed_entry(&self, package: &PackageId) -> Result<Option<Manifest>> {
        let path = self.installed_index_path();
        let Some(index) = read_json(package, &path)? else {
            return Ok(None);
        };

        let entries = match &index {
            Value::Array(entries) => entries,
            Value::Object(map) => match map.get("packages") {
                Some(Value::Array(entries)) => entries,
                _ => return Err(malformed(package, &path, "missing 'packages' array")),
            },
            _ => return Err(malformed(package, &path, "unexpected installed.json layout")),
        };

        let entry = entries.iter().find(|entry| {
            entry
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name.eq_ignore_ascii_case(package.as_str()))
        });
        Ok(entry.map(|value| Manifest {
            path: path.clone(),
            value: value.clone(),
        }))
    }

    fn manifest(&self, package: &PackageId) -> Result<Option<Manifest>> {
        match self.package_manifest(package)? {
            Some(manifest) => Ok(Some(manifest)),
            None => self.installed_entry(package),
        }
    }

    fn providers(&self, package: &PackageId, manifest: &Manifest) -> Result<Vec<EntryPoint>> {
        let fail = |reason: String| malformed(package, &manifest.path, reason);

        let Some(extra) = manifest.value.get("extra") else {
            return Ok(Vec::new());
        };
        let extra = extra
            .as_object()
            .ok_or_else(|| fail("'extra' is not an object".to_string()))?;

        let Some(section) = extra.get(&self.registration_key) else {
            return Ok(Vec::new());
        };
        let section = section
            .as_object()
            .ok_or_else(|| fail(format!("'extra.{}' is not an object", self.registration_key)))?;

        let Some(providers) = section.get("providers") else {
            return Ok(Vec::new());
        };
        let providers = providers.as_array().ok_or_else(|| {
            fail(format!(
                "'extra.{}.providers' is not an array",
                self.registration_key
            ))
        })?;

        let mut entry_points: Vec<EntryPoint> = Vec::with_capacity(providers.len());
        for (index, provider) in providers.iter().enumerate() {
            let id = provider
                .as_str()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| fail(format!("provider #{index} is not a non-empty string")))?;
            let entry_point = EntryPoint::new(id);
            if !entry_points.contains(&entry_point) {
                entry_points.push(entry_point);
            }
        }
        Ok(entry_points)
    }
}

impl Detector for ServiceProviderDetector {
    fn detect(&self, package: &PackageId) -> Result<Vec<EntryPoint>> {
        let Some(manifest) = self.manifest(package)? else {
            tracing::debug!(package = %package, "no package metadata; no entry points");
            return Ok(Vec::new());
        };

        let entry_points = self.providers(package, &manifest)?;
        tracing::debug!(
            package = %package,
            path = %manifest.path.display(),
            count = entry_points.len(),
            "entry points discovered"
        );
        Ok(entry_points)
    }

    fn installed_version(&self, package: &PackageId) -> Result<Option<String>> {
        let version_of = |manifest: &Manifest| {
            manifest
                .value
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        // A package's own composer.json rarely carries a version.
        if let Some(version) = self.package_manifest(package)?.as_ref().and_then(version_of) {
            return Ok(Some(version));
        }
        Ok(self.installed_entry(package)?.as_ref().and_then(version_of))
    }
}

fn read_json(package: &PackageId, path: &Path) -> Result<Option<Value>> {
    let content = conduit_fs::io::read_text_if_exists(path)
        .map_err(|e| malformed(package, path, e.to_string()))?;
    let Some(content) = content else {
        return Ok(None);
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| malformed(package, path, format!("invalid JSON: {e}")))
}

fn malformed(package: &PackageId, path: &Path, reason: impl Into<String>) -> Error {
    Error::EntryPointDiscovery {
        package: package.to_string(),
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
