//! End-to-end install flow against a fake package manager
//!
//! Exercises the complete stack built from configuration: identifier
//! validation -> `composer require` subprocess -> provider discovery ->
//! registry write -> health probes.
#![cfg(unix)]

use std::sync::Arc;

use conduit_components::{
    ComponentInstallationService, ComponentManager, ConduitConfig, EntryPoint, InstallStage,
    InstallState, JsonFileStorage, Storage,
};
use conduit_test_utils::{FakeComposer, RecordingSink, TestWorkspace};
use pretty_assertions::assert_eq;

const COMPONENTS: &str = r#"
[components.demo]
package = "vendor/demo"
version = "^1.0"
commands = ["demo:run"]
description = "Demo component"

[components.other]
package = "acme/other"
"#;

fn service(ws: &TestWorkspace) -> (ConduitConfig, ComponentInstallationService<JsonFileStorage>) {
    let config = ConduitConfig::load(&ws.config_path()).unwrap();
    let detector = Arc::new(config.detector());
    let service = ComponentInstallationService::new(
        ComponentManager::new(config.storage().unwrap()),
        Arc::new(config.installer().with_sink(Arc::new(RecordingSink::new()))),
        detector.clone(),
    )
    .with_probes(config.probes(detector));
    (config, service)
}

fn workspace(composer: &FakeComposer, listing: &[&str]) -> TestWorkspace {
    let ws = TestWorkspace::new();
    ws.install_fake_composer(composer);
    ws.install_fake_listing(listing);
    ws.write_config(COMPONENTS);
    ws
}

#[tokio::test]
async fn demo_component_end_to_end() {
    let ws = workspace(
        &FakeComposer::new().providers(&["Demo\\Provider"]).version("1.3.0"),
        &["demo:run"],
    );
    let (config, service) = service(&ws);

    let request = config.component("demo").unwrap().request("demo");
    let report = service.install(&request).await;

    assert_eq!(report.state(), InstallState::Succeeded, "{:?}", report.failure);
    assert!(report.is_healthy(), "{:?}", report.verification);
    assert_eq!(
        ws.composer_args().unwrap(),
        vec!["require".to_string(), "vendor/demo".to_string()]
    );

    let registry = config.storage().unwrap().load().unwrap();
    let component = registry.get("demo").unwrap();
    assert_eq!(component.package_id.as_str(), "vendor/demo");
    assert_eq!(component.version_constraint, "^1.0");
    assert_eq!(component.entry_points, vec![EntryPoint::new("Demo\\Provider")]);
    assert_eq!(component.metadata["description"], "Demo component");
}

#[tokio::test]
async fn out_of_range_installed_version_fails_verification_only() {
    let ws = workspace(&FakeComposer::new().version("2.1.0"), &["demo:run"]);
    let (config, service) = service(&ws);

    let report = service
        .install(&config.component("demo").unwrap().request("demo"))
        .await;

    assert!(report.is_success());
    let verification = report.verification.unwrap();
    let failed: Vec<&str> = verification.failures().map(|c| c.name.as_str()).collect();
    assert_eq!(failed, vec!["version-constraint"]);
    assert!(service.manager().is_installed("demo").unwrap());
}

#[tokio::test]
async fn failed_install_leaves_registry_file_untouched() {
    let ws = workspace(&FakeComposer::new().providers(&["Other\\Provider"]), &[]);
    let (config, service) = service(&ws);
    service
        .install(&config.component("other").unwrap().request("other"))
        .await;
    let before = std::fs::read(ws.registry_path()).unwrap();

    // Swap in a package manager that fails.
    ws.install_fake_composer(&FakeComposer::new().exit_code(1).stderr("network down"));
    let report = service
        .install(&config.component("demo").unwrap().request("demo"))
        .await;

    assert_eq!(report.state(), InstallState::Failed(InstallStage::Install));
    assert_eq!(std::fs::read(ws.registry_path()).unwrap(), before);
}

#[tokio::test]
async fn malformed_metadata_diverges_without_registering() {
    let ws = workspace(&FakeComposer::new().malformed_metadata(), &[]);
    let (config, service) = service(&ws);

    let report = service
        .install(&config.component("demo").unwrap().request("demo"))
        .await;

    assert_eq!(report.state(), InstallState::Failed(InstallStage::Discover));
    assert!(report.is_diverged());
    assert!(ws.vendor_dir().join("vendor/demo/composer.json").exists());
    assert!(!service.manager().is_installed("demo").unwrap());
}

#[tokio::test]
async fn registry_survives_resave_byte_for_byte() {
    let ws = workspace(&FakeComposer::new().providers(&["A", "B"]), &["demo:run"]);
    let (config, service) = service(&ws);
    for name in ["demo", "other"] {
        let report = service
            .install(&config.component(name).unwrap().request(name))
            .await;
        assert!(report.is_success());
    }

    let storage = config.storage().unwrap();
    let before = std::fs::read(ws.registry_path()).unwrap();
    storage.save(&storage.load().unwrap()).unwrap();
    assert_eq!(std::fs::read(ws.registry_path()).unwrap(), before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parallel_installs_of_different_components_both_land() {
    let ws = workspace(&FakeComposer::new().providers(&["P"]), &[]);
    let config = ConduitConfig::load(&ws.config_path()).unwrap();

    let first = service(&ws).1;
    let second = service(&ws).1;
    let demo = config.component("demo").unwrap().request("demo");
    let other = config.component("other").unwrap().request("other");

    let (a, b) = tokio::join!(first.install(&demo), second.install(&other));
    assert!(a.is_success(), "{:?}", a.failure);
    assert!(b.is_success(), "{:?}", b.failure);

    let names: Vec<String> = first
        .manager()
        .list()
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["demo", "other"]);
}
