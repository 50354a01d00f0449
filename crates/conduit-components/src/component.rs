//! Registry records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifier::{PackageId, validate_component_name};

/// An identifier the host framework uses to activate functionality
/// contributed by a package, e.g. a fully-qualified provider class name.
///
/// Opaque to this crate beyond being a non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryPoint(String);

impl EntryPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryPoint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntryPoint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A registered extension package with its framework metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Registry key (e.g. `github`).
    pub name: String,
    /// Package manager identifier (e.g. `jordanpartridge/github-zero`).
    pub package_id: PackageId,
    /// Semantic version range recorded for future upgrades.
    pub version_constraint: String,
    /// Descriptive fields from framework configuration.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Discovered entry points, in activation order.
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
    pub installed_at: DateTime<Utc>,
    /// Fields written by newer versions; carried through rewrites untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Everything `register` needs besides the name and constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentMetadata {
    pub package_id: PackageId,
    pub entry_points: Vec<EntryPoint>,
    pub fields: Map<String, Value>,
}

impl ComponentMetadata {
    pub fn new(package_id: PackageId) -> Self {
        Self {
            package_id,
            entry_points: Vec::new(),
            fields: Map::new(),
        }
    }

    pub fn with_entry_points(mut self, entry_points: Vec<EntryPoint>) -> Self {
        self.entry_points = entry_points;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }
}

/// Mapping of component name to [`Component`].
///
/// Serialized as a plain JSON object keyed by name. Backed by a
/// `BTreeMap` so the encoding is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentRegistry {
    components: BTreeMap<String, Component>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Insert or replace the record under its own name.
    pub fn insert(&mut self, component: Component) -> Option<Component> {
        self.components.insert(component.name.clone(), component)
    }

    pub fn remove(&mut self, name: &str) -> Option<Component> {
        self.components.remove(name)
    }

    /// Components in name order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Check the registry invariants, returning a description of the
    /// first violation.
    ///
    /// Package identifiers are already validated by their type during
    /// deserialization.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for (key, component) in &self.components {
            if key != &component.name {
                return Err(format!(
                    "entry '{key}' has mismatched name '{}'",
                    component.name
                ));
            }
            validate_component_name(key).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl FromIterator<Component> for ComponentRegistry {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        let mut registry = Self::new();
        for component in iter {
            registry.insert(component);
        }
        registry
    }
}
