//! Configuration and collaborators shared by the commands

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use conduit_components::{
    CONFIG_FILENAME, ComponentInstallationService, ComponentManager, ConduitConfig, JsonFileStorage,
    OutputSink, OutputStream,
};

use crate::error::Result;

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ConduitConfig,
}

impl Context {
    /// Load `config` if given (it must exist), otherwise `./conduit.toml`
    /// when present. `registry` overrides the configured registry path.
    pub fn load(config: Option<&Path>, registry: Option<PathBuf>) -> Result<Self> {
        let mut config = match config {
            Some(path) => ConduitConfig::load(path)?,
            None => ConduitConfig::load_or_default(Path::new(CONFIG_FILENAME))?,
        };
        if let Some(registry) = registry {
            config.storage.registry = Some(registry);
        }
        Ok(Self { config })
    }

    pub fn manager(&self) -> Result<ComponentManager<JsonFileStorage>> {
        Ok(ComponentManager::new(self.config.storage()?))
    }

    /// Service wired from configuration, streaming package manager output
    /// to the terminal.
    pub fn service(
        &self,
        timeout_secs: Option<u64>,
    ) -> Result<ComponentInstallationService<JsonFileStorage>> {
        let mut installer = self.config.installer().with_sink(Arc::new(ConsoleSink));
        if let Some(secs) = timeout_secs {
            installer = installer.with_timeout(std::time::Duration::from_secs(secs));
        }
        let detector = Arc::new(self.config.detector());
        let probes = self.config.probes(detector.clone());
        Ok(
            ComponentInstallationService::new(self.manager()?, Arc::new(installer), detector)
                .with_probes(probes),
        )
    }
}

/// Prints package manager output as it arrives.
struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn line(&self, stream: OutputStream, line: &str) {
        match stream {
            OutputStream::Stdout => println!("  {}", line.dimmed()),
            OutputStream::Stderr => eprintln!("  {}", line.yellow()),
        }
    }
}

/// Run `future` to completion on a single-threaded runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
