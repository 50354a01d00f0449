//! Registry API: register, unregister and query components.

use chrono::Utc;
use serde_json::Map;

use crate::component::{Component, ComponentMetadata};
use crate::error::Result;
use crate::identifier::validate_component_name;
use crate::storage::Storage;
use crate::version::VersionConstraint;

/// Owns all mutation of the component registry.
///
/// Every mutation holds the storage lock across load, change and save,
/// so concurrent writers (threads or processes) never lose an update.
#[derive(Debug)]
pub struct ComponentManager<S> {
    storage: S,
}

impl<S: Storage> ComponentManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Whether `name` is in the registry.
    pub fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.storage.load()?.contains(name))
    }

    /// Record a component, replacing any previous record under `name`.
    ///
    /// The constraint is validated and stored verbatim. Fields unknown to
    /// this version on a replaced record are not carried over.
    pub fn register(
        &self,
        name: &str,
        metadata: ComponentMetadata,
        version_constraint: &str,
    ) -> Result<Component> {
        validate_component_name(name)?;
        VersionConstraint::parse(version_constraint)?;

        let component = Component {
            name: name.to_string(),
            package_id: metadata.package_id,
            version_constraint: version_constraint.to_string(),
            metadata: metadata.fields,
            entry_points: metadata.entry_points,
            installed_at: Utc::now(),
            extra: Map::new(),
        };

        let _guard = self.storage.lock()?;
        let mut registry = self.storage.load()?;
        let previous = registry.insert(component.clone());
        self.storage.save(&registry)?;

        match previous {
            Some(previous) if previous.package_id != component.package_id => {
                tracing::warn!(
                    component = name,
                    previous = %previous.package_id,
                    package = %component.package_id,
                    "component re-registered with a different package"
                );
            }
            Some(_) => {
                tracing::info!(component = name, package = %component.package_id, "component re-registered");
            }
            None => {
                tracing::info!(component = name, package = %component.package_id, "component registered");
            }
        }
        Ok(component)
    }

    /// Remove `name` from the registry, returning the removed record.
    ///
    /// Removing an absent component is a no-op and writes nothing.
    pub fn unregister(&self, name: &str) -> Result<Option<Component>> {
        let _guard = self.storage.lock()?;
        let mut registry = self.storage.load()?;
        let Some(removed) = registry.remove(name) else {
            tracing::debug!(component = name, "not registered; nothing to remove");
            return Ok(None);
        };
        self.storage.save(&registry)?;

        tracing::info!(component = name, package = %removed.package_id, "component unregistered");
        Ok(Some(removed))
    }

    pub fn get(&self, name: &str) -> Result<Option<Component>> {
        Ok(self.storage.load()?.get(name).cloned())
    }

    /// All components, sorted by name.
    pub fn list(&self) -> Result<Vec<Component>> {
        Ok(self.storage.load()?.components().cloned().collect())
    }
}
