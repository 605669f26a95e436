//! End-to-end orchestrator tests against the mock process runner.

use std::path::Path;

use treekeeper::config::{Settings, Toolchain};
use treekeeper::error::Error;
use treekeeper::exec::Orchestrator;
use treekeeper::job::JobDocument;
use treekeeper::subprocess::{MockProcessRunner, SubprocessManager};

fn document(yaml: &str) -> JobDocument {
    serde_yaml::from_str(yaml).expect("test document parses")
}

fn orchestrator(settings: Settings) -> (Orchestrator, MockProcessRunner) {
    let (subprocess, mock) = SubprocessManager::mock();
    (
        Orchestrator::new(settings, Toolchain::unresolved(), subprocess),
        mock,
    )
}

fn nul_joined(paths: &[&Path]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for p in paths {
        bytes.extend_from_slice(p.to_str().unwrap().as_bytes());
        bytes.push(0);
    }
    bytes
}

#[tokio::test]
async fn forced_job_applies_both_categories_to_all_targets() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("data");
    std::fs::create_dir(&target).unwrap();

    let (orchestrator, mock) = orchestrator(Settings::default());
    mock.expect_command("find")
        .returns_stdout(&nul_joined(&[&target]))
        .finish();
    mock.expect_command("chown").returns_exit_code(0).finish();
    mock.expect_command("chmod").returns_exit_code(0).finish();

    let doc = document(&format!(
        r#"
jobs:
  - ownership: "0:0"
    permissions: "0750"
    flags: "forced"
    targets: ["{}"]
"#,
        target.display()
    ));
    let summary = orchestrator.run(&doc).await.unwrap();
    assert_eq!(summary.succeeded, 1);

    // Forced mode bypasses the oracle: exactly one chown and one chmod,
    // both on the real target, none on scratch paths.
    let chown_calls = mock.calls_to("chown");
    let chmod_calls = mock.calls_to("chmod");
    assert_eq!(chown_calls.len(), 1);
    assert_eq!(chmod_calls.len(), 1);
    assert!(chown_calls[0]
        .args
        .contains(&target.to_str().unwrap().to_string()));
    // Two independent enumerations, one per category.
    assert_eq!(mock.times_called("find"), 2);
}

#[tokio::test]
async fn unforced_job_probes_scratch_objects_and_cleans_them_up() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("f");
    std::fs::write(&target, b"x").unwrap();

    let (orchestrator, mock) = orchestrator(Settings::default());
    mock.expect_command("chmod").returns_exit_code(0).finish();
    mock.expect_command("find")
        .returns_stdout(&nul_joined(&[&target]))
        .finish();

    let doc = document(&format!(
        r#"
jobs:
  - permissions: "0444"
    targets: ["{}"]
"#,
        target.display()
    ));
    orchestrator.run(&doc).await.unwrap();

    // First chmod call is the probe against the two scratch objects.
    let chmod_calls = mock.calls_to("chmod");
    assert!(!chmod_calls.is_empty());
    let probe_paths: Vec<&String> = chmod_calls[0].args.iter().skip(3).collect();
    assert_eq!(probe_paths.len(), 2);
    for path in probe_paths {
        assert!(
            std::fs::symlink_metadata(path).is_err(),
            "scratch object {path} survived the job"
        );
    }
}

#[tokio::test]
async fn already_correct_targets_produce_no_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("f");
    std::fs::write(&target, b"x").unwrap();
    // tempfile scratch files are created 0600; make the target match.
    std::fs::set_permissions(&target, std::os::unix::fs::PermissionsExt::from_mode(0o600)).unwrap();

    let (orchestrator, mock) = orchestrator(Settings::default());
    mock.expect_command("chmod").returns_exit_code(0).finish();
    mock.expect_command("find").finish();

    let doc = document(&format!(
        r#"
jobs:
  - permissions: "0600"
    targets: ["{}"]
"#,
        target.display()
    ));
    let summary = orchestrator.run(&doc).await.unwrap();
    assert_eq!(summary.succeeded, 1);

    // Only the probe ran; the target needed nothing, so no enumeration and
    // no second chmod.
    assert_eq!(mock.times_called("chmod"), 1);
    assert_eq!(mock.times_called("find"), 0);
}

#[tokio::test]
async fn job_without_targets_is_skipped_and_the_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("data");
    std::fs::create_dir(&target).unwrap();

    let (orchestrator, mock) = orchestrator(Settings::default());
    mock.expect_command("find")
        .returns_stdout(&nul_joined(&[&target]))
        .finish();
    mock.expect_command("chmod").returns_exit_code(0).finish();

    let doc = document(&format!(
        r#"
jobs:
  - permissions: "0750"
    targets: []
  - permissions: "0750"
    flags: "forced"
    targets: ["{}"]
"#,
        target.display()
    ));
    let summary = orchestrator.run(&doc).await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.succeeded, 1);
}

#[tokio::test]
async fn job_with_no_requested_change_is_skipped() {
    let (orchestrator, _mock) = orchestrator(Settings::default());
    let doc = document(
        r#"
jobs:
  - targets: ["/srv/data"]
"#,
    );
    let summary = orchestrator.run(&doc).await.unwrap();
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn configuration_error_aborts_the_run_with_the_job_number() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("data");
    std::fs::create_dir(&target).unwrap();

    let (orchestrator, mock) = orchestrator(Settings::default());
    mock.expect_command("find")
        .returns_stdout(&nul_joined(&[&target]))
        .finish();
    mock.expect_command("chmod").returns_exit_code(0).finish();

    let doc = document(&format!(
        r#"
jobs:
  - permissions: "0750"
    flags: "forced"
    targets: ["{0}"]
  - permissions: "0750"
    flags: "bogus"
    targets: ["{0}"]
  - permissions: "0700"
    flags: "forced"
    targets: ["{0}"]
"#,
        target.display()
    ));
    let err = orchestrator.run(&doc).await.unwrap_err();
    match err {
        Error::Job { number, source } => {
            assert_eq!(number, 2);
            assert!(matches!(*source, Error::InvalidFlag(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }

    // Job 1 ran, job 3 never started.
    assert_eq!(mock.times_called("chmod"), 1);
}

#[tokio::test]
async fn missing_target_without_create_fails_listing_the_paths() {
    let dir = tempfile::tempdir().unwrap();
    let gone = dir.path().join("gone");

    let (orchestrator, _mock) = orchestrator(Settings::default());
    let doc = document(&format!(
        r#"
jobs:
  - permissions: "0750"
    targets: ["{}"]
"#,
        gone.display()
    ));
    let err = orchestrator.run(&doc).await.unwrap_err();
    match err {
        Error::Job { number, source } => {
            assert_eq!(number, 1);
            assert!(matches!(*source, Error::MissingTargets(list) if list == vec![gone]));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn create_flag_materializes_missing_targets_and_proceeds() {
    let dir = tempfile::tempdir().unwrap();
    let fresh = dir.path().join("fresh");

    let (orchestrator, mock) = orchestrator(Settings::default());
    mock.expect_command("find")
        .returns_stdout(&nul_joined(&[&fresh]))
        .finish();
    mock.expect_command("chmod").returns_exit_code(0).finish();

    let doc = document(&format!(
        r#"
jobs:
  - permissions: "0750"
    flags: "create,forced"
    targets: ["{}"]
"#,
        fresh.display()
    ));
    let summary = orchestrator.run(&doc).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert!(fresh.is_dir());
}

#[tokio::test]
async fn mutation_failure_is_fatal_with_full_privileges() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("data");
    std::fs::create_dir(&target).unwrap();

    let (orchestrator, mock) = orchestrator(Settings::default());
    mock.expect_command("find")
        .returns_stdout(&nul_joined(&[&target]))
        .finish();
    mock.expect_command("chmod").returns_exit_code(1).finish();

    let doc = document(&format!(
        r#"
jobs:
  - permissions: "0750"
    flags: "forced"
    targets: ["{}"]
"#,
        target.display()
    ));
    let err = orchestrator.run(&doc).await.unwrap_err();
    match err {
        Error::Job { number, source } => {
            assert_eq!(number, 1);
            assert!(matches!(*source, Error::MutationFailed { .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn mutation_failure_is_suppressed_without_privileges() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("data");
    std::fs::create_dir(&target).unwrap();

    let settings = Settings {
        reduced_privileges: true,
        ..Settings::default()
    };
    let (orchestrator, mock) = orchestrator(settings);
    mock.expect_command("find")
        .returns_stdout(&nul_joined(&[&target]))
        .finish();
    mock.expect_command("chmod").returns_exit_code(1).finish();

    let doc = document(&format!(
        r#"
jobs:
  - permissions: "0750"
    flags: "forced"
    targets: ["{}"]
"#,
        target.display()
    ));
    let summary = orchestrator.run(&doc).await.unwrap();
    assert_eq!(summary.succeeded, 1);
}

#[tokio::test]
async fn ownership_failure_does_not_prevent_the_permission_pass() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("data");
    std::fs::create_dir(&target).unwrap();

    let (orchestrator, mock) = orchestrator(Settings::default());
    mock.expect_command("find")
        .returns_stdout(&nul_joined(&[&target]))
        .finish();
    mock.expect_command("chown").returns_exit_code(1).finish();
    mock.expect_command("chmod").returns_exit_code(0).finish();

    let doc = document(&format!(
        r#"
jobs:
  - ownership: "0:0"
    permissions: "0750"
    flags: "forced"
    targets: ["{}"]
"#,
        target.display()
    ));
    let err = orchestrator.run(&doc).await.unwrap_err();
    assert!(matches!(err, Error::Job { .. }));

    // The permission pass still ran after the ownership pass failed.
    assert_eq!(mock.times_called("chmod"), 1);
}
