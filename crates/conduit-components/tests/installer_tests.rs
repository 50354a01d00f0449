//! SecurePackageInstaller against a fake package manager script
#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use conduit_components::{
    Error, Installer, OutputSink, OutputStream, PackageId, SecurePackageInstaller,
};
use conduit_test_utils::{FakeComposer, RecordingSink, TestWorkspace};
use pretty_assertions::assert_eq;

fn installer(ws: &TestWorkspace, composer: &FakeComposer) -> SecurePackageInstaller {
    SecurePackageInstaller::new()
        .with_binary(ws.install_fake_composer(composer))
        .with_working_dir(ws.root())
        .with_timeout(Duration::from_secs(10))
}

fn demo() -> PackageId {
    PackageId::parse("vendor/demo").unwrap()
}

#[tokio::test]
async fn passes_require_and_identifier_as_discrete_arguments() {
    let ws = TestWorkspace::new();
    let result = installer(&ws, &FakeComposer::new().providers(&["Demo\\Provider"]))
        .install(&demo())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(
        ws.composer_args().unwrap(),
        vec!["require".to_string(), "vendor/demo".to_string()]
    );
    assert!(ws.vendor_dir().join("vendor/demo/composer.json").is_file());
}

#[tokio::test]
async fn streams_and_captures_output() {
    let ws = TestWorkspace::new();
    let sink = Arc::new(RecordingSink::new());
    let result = installer(&ws, &FakeComposer::new().stderr("Deprecation notice"))
        .with_sink(sink.clone())
        .install(&demo())
        .await
        .unwrap();

    assert!(result.stdout.contains("Using version ^1.0 for vendor/demo"));
    assert!(result.stdout.contains("Package operations: 1 install"));
    assert_eq!(result.stderr, "Deprecation notice\n");
    assert_eq!(
        sink.lines_on(OutputStream::Stdout),
        vec![
            "Using version ^1.0 for vendor/demo".to_string(),
            "Package operations: 1 install".to_string(),
        ]
    );
    assert_eq!(sink.lines_on(OutputStream::Stderr), vec!["Deprecation notice"]);
}

#[tokio::test]
async fn non_zero_exit_is_an_unsuccessful_result() {
    let ws = TestWorkspace::new();
    let result = installer(
        &ws,
        &FakeComposer::new()
            .exit_code(2)
            .stderr("Could not find a matching version"),
    )
    .install(&demo())
    .await
    .unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code, Some(2));
    assert!(result.stderr.contains("Could not find a matching version"));
    assert!(!ws.vendor_dir().exists());
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let ws = TestWorkspace::new();
    let installer = installer(&ws, &FakeComposer::new().sleep_secs(30))
        .with_timeout(Duration::from_millis(300));

    let started = std::time::Instant::now();
    let err = installer.install(&demo()).await.unwrap_err();

    assert!(
        matches!(err, Error::InstallTimeout { ref package, .. } if package == "vendor/demo"),
        "got: {err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!ws.vendor_dir().exists());
}

#[tokio::test]
async fn invalid_utf8_output_does_not_stop_capture() {
    let ws = TestWorkspace::new();
    let binary = ws.install_script("composer", "printf 'before\\n\\377\\nafter\\n'\nexit 0\n");
    let sink = Arc::new(RecordingSink::new());
    let result = SecurePackageInstaller::new()
        .with_binary(binary)
        .with_working_dir(ws.root())
        .with_timeout(Duration::from_secs(10))
        .with_sink(sink.clone())
        .install(&demo())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.stdout, "before\n\u{FFFD}\nafter\n");
    assert_eq!(
        sink.lines_on(OutputStream::Stdout),
        vec!["before".to_string(), "\u{FFFD}".to_string(), "after".to_string()]
    );
}

#[tokio::test]
async fn timeout_covers_grandchildren_holding_the_pipes() {
    let ws = TestWorkspace::new();
    let binary = ws.install_script("composer", "sleep 20 &\necho done\nexit 0\n");
    let installer = SecurePackageInstaller::new()
        .with_binary(binary)
        .with_working_dir(ws.root())
        .with_timeout(Duration::from_secs(1));

    let started = std::time::Instant::now();
    let err = installer.install(&demo()).await.unwrap_err();

    assert!(matches!(err, Error::InstallTimeout { .. }), "got: {err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));
}

struct PanickingSink;

impl OutputSink for PanickingSink {
    fn line(&self, _stream: OutputStream, _line: &str) {
        panic!("sink failure");
    }
}

#[tokio::test]
async fn failed_output_reader_yields_empty_capture() {
    let ws = TestWorkspace::new();
    let binary = ws.install_script("composer", "echo hello\nexit 0\n");
    let result = SecurePackageInstaller::new()
        .with_binary(binary)
        .with_working_dir(ws.root())
        .with_timeout(Duration::from_secs(10))
        .with_sink(Arc::new(PanickingSink))
        .install(&demo())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "");
}

#[tokio::test]
async fn missing_working_directory_is_reported() {
    let ws = TestWorkspace::new();
    let installer = installer(&ws, &FakeComposer::new()).with_working_dir(ws.root().join("gone"));

    let err = installer.install(&demo()).await.unwrap_err();
    match err {
        Error::InstallProcess { stderr, .. } => assert!(stderr.contains("does not exist")),
        other => panic!("expected InstallProcess, got {other:?}"),
    }
}
