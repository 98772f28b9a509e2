// tests/local_executor.rs

mod common;

use std::time::{Duration, Instant};

use common::{init_tracing, quick_command, with_timeout};
use shellexec::exec::{Executor, LocalExecutor};
use shellexec::types::{COMMAND_EXCEPTION_RC, COMMAND_TIMEOUT_RC, Outcome};

#[tokio::test]
async fn test_echo_completes_with_output() {
    init_tracing();

    let mut executor = LocalExecutor::new(quick_command("echo hello", 5));
    let response = with_timeout(executor.execute()).await.unwrap();

    assert_eq!(response.rc(), Some(0));
    assert!(response.stdout().contains("hello"));
    assert!(response.pid().is_some());
    assert_eq!(executor.command().retry_count, 1);
}

#[tokio::test]
async fn test_slow_command_is_killed_at_timeout() {
    init_tracing();

    let mut executor =
        LocalExecutor::new(quick_command("sleep 10", 1).with_retries(false));
    let started = Instant::now();
    let response = with_timeout(executor.execute()).await.unwrap();

    assert_eq!(response.rc(), Some(COMMAND_TIMEOUT_RC));
    assert_eq!(response.stdout(), "");
    assert_eq!(response.outcome(), &Outcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(response.pid().is_some());
}

#[tokio::test]
async fn test_spawn_failure_is_local_exception() {
    init_tracing();

    let mut executor = LocalExecutor::new(quick_command("echo never", 5).with_retries(false))
        .with_shell("/nonexistent/bin/shell");
    let response = with_timeout(executor.execute()).await.unwrap();

    assert_eq!(response.rc(), Some(COMMAND_EXCEPTION_RC));
    assert_eq!(response.stdout(), "");
    assert!(matches!(response.outcome(), Outcome::ExecutionError(_)));
    assert!(response.pid().is_none());
}

#[tokio::test]
async fn test_stderr_is_merged_into_stdout() {
    let mut executor = LocalExecutor::new(quick_command("echo out; echo err >&2", 5));
    let response = with_timeout(executor.execute()).await.unwrap();

    assert_eq!(response.rc(), Some(0));
    assert_eq!(response.stdout(), "out\nerr\n");
}

#[tokio::test]
async fn test_nonzero_exit_passes_through_without_retry() {
    let dir = tempfile::tempdir().unwrap();
    let mut executor = LocalExecutor::new(
        quick_command("echo run >> attempts.log; exit 3", 5)
            .with_cwd(dir.path())
            .with_retry_limit(3),
    );
    let response = with_timeout(executor.execute()).await.unwrap();

    assert_eq!(response.rc(), Some(3));
    let attempts = std::fs::read_to_string(dir.path().join("attempts.log")).unwrap();
    assert_eq!(attempts.lines().count(), 1);
}

#[tokio::test]
async fn test_fast_command_is_not_overridden_by_watchdog() {
    let mut executor = LocalExecutor::new(quick_command("true", 1));
    let response = with_timeout(executor.execute()).await.unwrap();
    assert_eq!(response.rc(), Some(0));

    // Give a stray timer the chance to fire; it must have been cancelled.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(executor.command().response().rc(), Some(0));
    assert!(!executor.watchdog_mut().has_fired());
}

#[tokio::test]
async fn test_cwd_is_respected() {
    let dir = tempfile::tempdir().unwrap();
    let mut executor = LocalExecutor::new(quick_command("pwd", 5).with_cwd(dir.path()));
    let response = with_timeout(executor.execute()).await.unwrap();

    let expected = dir.path().canonicalize().unwrap();
    let reported = std::path::PathBuf::from(response.stdout().trim())
        .canonicalize()
        .unwrap();
    assert_eq!(reported, expected);
}

#[tokio::test]
async fn test_detached_command_returns_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let mut executor = LocalExecutor::new(
        quick_command("sleep 1; touch done", 5)
            .with_cwd(dir.path())
            .fire_and_forget(true),
    );
    let started = Instant::now();
    let response = with_timeout(executor.execute()).await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(response.rc(), None);
    assert_eq!(response.outcome(), &Outcome::Detached);
    assert!(response.pid().is_some());

    // The detached process keeps running after execute() returns.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(dir.path().join("done").exists());
}

#[tokio::test]
async fn test_activate_script_is_sourced_first() {
    let dir = tempfile::tempdir().unwrap();
    let activate = dir.path().join("activate");
    std::fs::write(&activate, "GREETING=activated\n").unwrap();

    let mut executor = LocalExecutor::new(
        quick_command("echo $GREETING", 5).with_activate_virtualenv(true),
    )
    .with_activate_script(&activate);
    let response = with_timeout(executor.execute()).await.unwrap();

    assert_eq!(response.stdout(), "activated\n");
}
