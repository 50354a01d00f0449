//! Durable persistence of the component registry.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use conduit_fs::{FileLock, RobustnessConfig, io};

use crate::component::ComponentRegistry;
use crate::error::{Error, Result};

/// Default registry filename inside the data directory.
pub const REGISTRY_FILENAME: &str = "components.json";

/// Exclusive access to a registry, released on drop.
pub struct RegistryGuard {
    _held: Box<dyn Send>,
}

impl RegistryGuard {
    pub fn new<T: Send + 'static>(held: T) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl std::fmt::Debug for RegistryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryGuard").finish_non_exhaustive()
    }
}

/// Load/save of the registry as one consistent unit.
pub trait Storage: Send + Sync {
    /// Load the registry; an absent store is an empty registry.
    fn load(&self) -> Result<ComponentRegistry>;

    /// Replace the persisted registry in one atomic step.
    fn save(&self, registry: &ComponentRegistry) -> Result<()>;

    /// Block other writers until the returned guard is dropped.
    fn lock(&self) -> Result<RegistryGuard>;
}

/// Registry stored as a pretty-printed JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
    lock_path: PathBuf,
    robustness: RobustnessConfig,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self {
            path,
            lock_path,
            robustness: RobustnessConfig::default(),
        }
    }

    /// Registry under the platform data directory
    /// (`~/.local/share/conduit/components.json` on Linux).
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("conduit").join(REGISTRY_FILENAME))
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.robustness.lock_timeout = timeout;
        self
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn corrupt(&self, reason: impl Into<String>) -> Error {
        Error::StorageCorruption {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<ComponentRegistry> {
        let content = io::read_text_if_exists(&self.path).map_err(|source| Error::StorageRead {
            path: self.path.clone(),
            source,
        })?;
        let Some(content) = content else {
            tracing::debug!(path = %self.path.display(), "no registry yet");
            return Ok(ComponentRegistry::new());
        };
        if content.trim().is_empty() {
            return Err(self.corrupt("file is empty"));
        }

        let registry: ComponentRegistry =
            serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;
        registry
            .check_invariants()
            .map_err(|reason| self.corrupt(reason))?;

        tracing::debug!(path = %self.path.display(), components = registry.len(), "registry loaded");
        Ok(registry)
    }

    fn save(&self, registry: &ComponentRegistry) -> Result<()> {
        let mut content = serde_json::to_string_pretty(registry).map_err(|e| Error::StorageWrite {
            path: self.path.clone(),
            source: conduit_fs::Error::io(&self.path, e.into()),
        })?;
        content.push('\n');

        io::write_atomic(&self.path, content.as_bytes(), self.robustness).map_err(|source| {
            Error::StorageWrite {
                path: self.path.clone(),
                source,
            }
        })?;

        tracing::debug!(path = %self.path.display(), components = registry.len(), "registry saved");
        Ok(())
    }

    fn lock(&self) -> Result<RegistryGuard> {
        match FileLock::acquire(&self.lock_path, self.robustness.lock_timeout) {
            Ok(lock) => Ok(RegistryGuard::new(lock)),
            Err(conduit_fs::Error::LockFailed { path, .. }) => Err(Error::RegistryLocked { path }),
            Err(source) => Err(Error::StorageWrite {
                path: self.lock_path.clone(),
                source,
            }),
        }
    }
}

/// Process-local registry, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    registry: Arc<Mutex<ComponentRegistry>>,
    gate: Arc<WriterGate>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(Mutex::new(registry)),
            gate: Arc::default(),
        }
    }

    fn registry(&self) -> MutexGuard<'_, ComponentRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<ComponentRegistry> {
        Ok(self.registry().clone())
    }

    fn save(&self, registry: &ComponentRegistry) -> Result<()> {
        *self.registry() = registry.clone();
        Ok(())
    }

    fn lock(&self) -> Result<RegistryGuard> {
        Ok(RegistryGuard::new(WriterToken::acquire(Arc::clone(&self.gate))))
    }
}

#[derive(Debug, Default)]
struct WriterGate {
    busy: Mutex<bool>,
    released: Condvar,
}

/// Owned writer slot; a `MutexGuard` cannot outlive its borrow.
struct WriterToken {
    gate: Arc<WriterGate>,
}

impl WriterToken {
    fn acquire(gate: Arc<WriterGate>) -> Self {
        let mut busy = gate.busy.lock().unwrap_or_else(PoisonError::into_inner);
        while *busy {
            busy = gate
                .released
                .wait(busy)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *busy = true;
        drop(busy);
        Self { gate }
    }
}

impl Drop for WriterToken {
    fn drop(&mut self) {
        *self.gate.busy.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.gate.released.notify_one();
    }
}
