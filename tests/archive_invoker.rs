// tests/archive_invoker.rs

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use borgsnap::archive::{ArchiveInvoker, ArchiveOutcome};
use borgsnap::errors::{BackupError, describe};
use borgsnap::exec::CommandEnv;
use borgsnap_test_utils::fakes::{ArchiveBehaviour, FakeRunner};
use borgsnap_test_utils::{init_tracing, with_timeout};

fn env() -> CommandEnv {
    CommandEnv::from_pairs([("BORG_REPO", "/srv/repo"), ("BORG_PASSPHRASE", "secret")])
}

fn mountpoints() -> Vec<String> {
    vec!["/mnt/a".to_string(), "/mnt/b".to_string()]
}

#[tokio::test]
async fn completed_archive_receives_full_environment() {
    init_tracing();
    let runner = FakeRunner::default();
    let invoker = ArchiveInvoker::new(runner.clone(), "borg", env(), false);

    let outcome = invoker
        .invoke("label@host", &mountpoints(), &[], CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, ArchiveOutcome::Completed);
    let spec = &runner.supervised()[0];
    assert_eq!(
        spec.argv(),
        vec!["borg", "create", "::label@host", "/mnt/a", "/mnt/b"]
    );
    assert_eq!(spec.env.get("BORG_PASSPHRASE"), Some("secret"));
}

#[tokio::test]
async fn dry_run_starts_nothing() {
    init_tracing();
    let runner = FakeRunner::default();
    let invoker = ArchiveInvoker::new(runner.clone(), "borg", env(), true);
    assert!(invoker.is_dry_run());

    let outcome = invoker
        .invoke(
            "label@host",
            &mountpoints(),
            &["--stats".to_string()],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, ArchiveOutcome::DryRun);
    assert!(runner.supervised().is_empty());
}

#[tokio::test]
async fn interruption_on_request_is_not_a_failure() {
    init_tracing();
    let runner = FakeRunner::new(ArchiveBehaviour::WaitForCancel);
    let invoker = ArchiveInvoker::new(runner, "borg", env(), false);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome = with_timeout(invoker.invoke("x@host", &mountpoints(), &[], cancel))
        .await
        .unwrap();
    assert_eq!(outcome, ArchiveOutcome::Interrupted);
}

#[tokio::test]
async fn nonzero_exit_is_archive_failure() {
    init_tracing();
    let invoker = ArchiveInvoker::new(
        FakeRunner::new(ArchiveBehaviour::Exit(1)),
        "borg",
        env(),
        false,
    );

    let err = invoker
        .invoke("x@host", &mountpoints(), &[], CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::ArchiveFailure { .. }));
    assert_eq!(
        describe(&err),
        "error while running archive tool: `borg` terminated with exit code 1"
    );
}

#[tokio::test]
async fn spawn_error_is_archive_failure() {
    init_tracing();
    let invoker = ArchiveInvoker::new(
        FakeRunner::new(ArchiveBehaviour::SpawnError),
        "borg",
        env(),
        false,
    );

    let err = invoker
        .invoke("x@host", &mountpoints(), &[], CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::ArchiveFailure { .. }));
    assert!(describe(&err).contains("no such file or directory"));
}
