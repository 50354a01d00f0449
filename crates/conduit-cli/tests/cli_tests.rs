//! Integration tests that invoke the compiled `conduit` binary

use assert_cmd::Command;
use conduit_test_utils::TestWorkspace;
use predicates::prelude::*;

/// A `conduit` command running inside `ws` with no ambient configuration.
fn conduit(ws: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("conduit").expect("Failed to find conduit binary");
    cmd.current_dir(ws.root())
        .env("NO_COLOR", "1")
        .env_remove("CONDUIT_CONFIG")
        .env_remove("CONDUIT_REGISTRY");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let ws = TestWorkspace::new();
    conduit(&ws)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("remove"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("verify"));
}

#[test]
fn test_no_command_prints_hint() {
    let ws = TestWorkspace::new();
    conduit(&ws)
        .assert()
        .success()
        .stdout(predicate::str::contains("conduit --help"));
}

#[test]
fn test_list_empty_registry() {
    let ws = TestWorkspace::new();
    conduit(&ws)
        .arg("list")
        .arg("--registry")
        .arg(ws.registry_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No components registered."));
}

#[test]
fn test_list_json_empty_registry() {
    let ws = TestWorkspace::new();
    let output = conduit(&ws)
        .args(["list", "--json"])
        .env("CONDUIT_REGISTRY", ws.registry_path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed, serde_json::json!([]));
}

#[test]
fn test_remove_unregistered_is_noop() {
    let ws = TestWorkspace::new();
    conduit(&ws)
        .args(["remove", "ghost"])
        .arg("--registry")
        .arg(ws.registry_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("not registered"));
    assert!(!ws.registry_path().exists());
}

#[test]
fn test_install_unknown_component_fails() {
    let ws = TestWorkspace::new();
    conduit(&ws)
        .args(["install", "mystery"])
        .arg("--registry")
        .arg(ws.registry_path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("unknown component 'mystery'"));
}

#[test]
fn test_install_rejects_unsafe_package_before_spawning() {
    let ws = TestWorkspace::new();
    conduit(&ws)
        .args(["install", "demo", "--package", "vendor/demo;touch pwned"])
        .arg("--registry")
        .arg(ws.registry_path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("validate stage failed"))
        .stderr(predicate::str::contains("invalid package identifier"));
    assert!(!ws.root().join("pwned").exists());
    assert!(!ws.registry_path().exists());
}

#[test]
fn test_corrupt_registry_is_reported() {
    let ws = TestWorkspace::new();
    ws.write_file("data/components.json", "{ broken");
    conduit(&ws)
        .arg("list")
        .arg("--registry")
        .arg(ws.registry_path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("is corrupt"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let ws = TestWorkspace::new();
    conduit(&ws)
        .args(["list", "--config", "nope.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[cfg(unix)]
mod with_fake_composer {
    use super::*;
    use conduit_test_utils::FakeComposer;

    const DEMO: &str = "[components.demo]\npackage = \"vendor/demo\"\nversion = \"^1.0\"\ncommands = [\"demo:run\"]\ndescription = \"Demo component\"\n";

    fn setup(composer: &FakeComposer, listing: &[&str]) -> TestWorkspace {
        let ws = TestWorkspace::new();
        ws.install_fake_composer(composer);
        ws.install_fake_listing(listing);
        ws.write_config(DEMO);
        ws
    }

    #[test]
    fn test_install_list_verify_remove() {
        let ws = setup(
            &FakeComposer::new().providers(&["Demo\\Provider"]),
            &["demo:run", "list"],
        );

        conduit(&ws)
            .args(["install", "demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Installing demo (vendor/demo ^1.0)"))
            .stdout(predicate::str::contains("Package operations: 1 install"))
            .stdout(predicate::str::contains("Registered demo with 1 entry point(s)"))
            .stdout(predicate::str::contains("Demo\\Provider"));

        let output = conduit(&ws).args(["list", "--json"]).output().unwrap();
        assert!(output.status.success());
        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(parsed[0]["name"], "demo");
        assert_eq!(parsed[0]["package_id"], "vendor/demo");
        assert_eq!(parsed[0]["entry_points"][0], "Demo\\Provider");
        assert_eq!(parsed[0]["metadata"]["description"], "Demo component");

        conduit(&ws)
            .args(["install", "demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already installed"));

        conduit(&ws)
            .args(["verify", "demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("demo is healthy"));

        conduit(&ws)
            .args(["remove", "demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("composer remove vendor/demo"));

        conduit(&ws)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No components registered."));
    }

    #[test]
    fn test_failed_install_exits_non_zero_and_registers_nothing() {
        let ws = setup(
            &FakeComposer::new()
                .exit_code(1)
                .stderr("Could not find package vendor/demo"),
            &[],
        );

        conduit(&ws)
            .args(["install", "demo"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("install stage failed"))
            .stderr(predicate::str::contains("Could not find package vendor/demo"));
        assert!(!ws.registry_path().exists());
    }

    #[test]
    fn test_malformed_metadata_reports_divergence() {
        let ws = setup(&FakeComposer::new().malformed_metadata(), &[]);

        conduit(&ws)
            .args(["install", "demo"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("installed but was not registered"))
            .stderr(predicate::str::contains("discover stage failed"));
        assert!(!ws.registry_path().exists());
    }

    #[test]
    fn test_failed_verification_is_advisory_on_install() {
        let ws = setup(&FakeComposer::new(), &["something:else"]);

        conduit(&ws)
            .args(["install", "demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("missing command(s): demo:run"))
            .stdout(predicate::str::contains("failed verification"));

        conduit(&ws)
            .args(["verify", "demo"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("check(s) failed for 'demo'"));
    }

    #[test]
    fn test_force_reinstalls() {
        let ws = setup(&FakeComposer::new(), &["demo:run"]);
        conduit(&ws).args(["install", "demo"]).assert().success();

        conduit(&ws)
            .args(["install", "demo", "--force", "--constraint", "^1.2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Registered demo"));

        let output = conduit(&ws).args(["list", "--json"]).output().unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(parsed[0]["version_constraint"], "^1.2");
    }
}
