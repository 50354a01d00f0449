//! [`TestWorkspace`]: a throwaway project directory with fake tooling.
//!
//! The fake `composer` is a POSIX shell script. It accepts only
//! `require <vendor/name>`, records its arguments in `.composer-args` and
//! writes `vendor/<vendor>/<name>/composer.json` the way a real install
//! would.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Behaviour of the fake `composer` script.
#[derive(Debug, Clone)]
pub struct FakeComposer {
    providers: Vec<String>,
    version: String,
    exit_code: i32,
    stderr: Option<String>,
    sleep_secs: Option<u32>,
    malformed_metadata: bool,
}

impl Default for FakeComposer {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            version: "1.2.0".to_string(),
            exit_code: 0,
            stderr: None,
            sleep_secs: None,
            malformed_metadata: false,
        }
    }
}

impl FakeComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Providers declared under `extra.laravel.providers`.
    pub fn providers(mut self, providers: &[&str]) -> Self {
        self.providers = providers.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Exit with `code` without writing any metadata.
    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn stderr(mut self, line: &str) -> Self {
        self.stderr = Some(line.to_string());
        self
    }

    /// Sleep before doing anything.
    pub fn sleep_secs(mut self, secs: u32) -> Self {
        self.sleep_secs = Some(secs);
        self
    }

    /// Install successfully but write unparseable `composer.json`.
    pub fn malformed_metadata(mut self) -> Self {
        self.malformed_metadata = true;
        self
    }

    fn metadata_printf(&self) -> String {
        if self.malformed_metadata {
            return "printf '%s\\n' '{ not json' > \"vendor/$pkg/composer.json\"".to_string();
        }

        let metadata = serde_json::json!({
            "name": "__PACKAGE__",
            "version": self.version,
            "extra": {"laravel": {"providers": self.providers}},
        })
        .to_string();
        let (prefix, suffix) = metadata
            .split_once("__PACKAGE__")
            .unwrap_or((metadata.as_str(), ""));
        format!("printf '%s%s%s\\n' '{prefix}' \"$pkg\" '{suffix}' > \"vendor/$pkg/composer.json\"")
    }

    /// The script body.
    pub fn script(&self) -> String {
        let mut script = String::from("#!/bin/sh\n");
        script.push_str("printf '%s\\n' \"$@\" > .composer-args\n");
        if let Some(secs) = self.sleep_secs {
            script.push_str(&format!("sleep {secs}\n"));
        }
        script.push_str(
            "if [ \"$1\" != \"require\" ] || [ $# -ne 2 ]; then\n  echo \"unexpected arguments: $*\" >&2\n  exit 64\nfi\n",
        );
        script.push_str("pkg=\"$2\"\n");
        script.push_str("echo \"Using version ^1.0 for $pkg\"\n");
        if let Some(line) = &self.stderr {
            script.push_str(&format!("echo '{line}' >&2\n"));
        }
        if self.exit_code != 0 {
            script.push_str(&format!("exit {}\n", self.exit_code));
            return script;
        }
        script.push_str("mkdir -p \"vendor/$pkg\"\n");
        script.push_str(&self.metadata_printf());
        script.push('\n');
        script.push_str("echo \"Package operations: 1 install\"\n");
        script
    }
}

/// A temporary project root.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root().join("data").join("components.json")
    }

    pub fn vendor_dir(&self) -> PathBuf {
        self.root().join("vendor")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("conduit.toml")
    }

    /// Arguments the fake composer last received, one per line.
    pub fn composer_args(&self) -> Option<Vec<String>> {
        fs::read_to_string(self.root().join(".composer-args"))
            .ok()
            .map(|s| s.lines().map(str::to_string).collect())
    }

    /// Write the fake `composer` script and return its path.
    pub fn install_fake_composer(&self, composer: &FakeComposer) -> PathBuf {
        self.write_executable("composer", &composer.script())
    }

    /// Write a fake command listing that prints `commands`, one per line.
    pub fn install_fake_listing(&self, commands: &[&str]) -> PathBuf {
        let mut script = String::from("#!/bin/sh\necho 'Available commands:'\n");
        for command in commands {
            script.push_str(&format!("echo '  {command}    Fake command'\n"));
        }
        self.write_executable("conduit-list", &script)
    }

    /// Write `conduit.toml` pointing at this workspace's registry, fake
    /// composer and fake listing.
    pub fn write_config(&self, components: &str) -> PathBuf {
        let toml = format!(
            "[storage]\nregistry = {registry:?}\nlock_timeout_secs = 2\n\n\
             [installer]\nbinary = {binary:?}\ntimeout_secs = 10\nworking_dir = {root:?}\n\n\
             [verify]\ncommand = [{listing:?}]\ntimeout_secs = 10\n\n{components}",
            registry = self.registry_path().display().to_string(),
            binary = self.bin_dir().join("composer").display().to_string(),
            root = self.root().display().to_string(),
            listing = self.bin_dir().join("conduit-list").display().to_string(),
        );
        let path = self.config_path();
        fs::write(&path, toml).unwrap();
        path
    }

    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root().join("bin")
    }

    /// Write an arbitrary shell script into the bin directory.
    pub fn install_script(&self, name: &str, body: &str) -> PathBuf {
        self.write_executable(name, &format!("#!/bin/sh\n{body}"))
    }

    #[cfg(unix)]
    fn write_executable(&self, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dir = self.bin_dir();
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(not(unix))]
    fn write_executable(&self, _name: &str, _script: &str) -> PathBuf {
        panic!("fake tooling scripts require a POSIX shell");
    }
}
