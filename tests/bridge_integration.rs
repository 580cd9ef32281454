//! Integration tests for the execution bridge against fake hosts

mod common;

use common::*;
use revbot::types::{ExecutionRequest, ExecutionStatus, ResultOrigin};
use serde_json::json;
use std::time::{Duration, Instant};

#[cfg(unix)]
#[tokio::test]
async fn test_process_transport_recovers_structured_result() {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("scripts");
    let cli = canned_host_cli(
        dir.path(),
        &json!({"success": true, "output": "hi\n", "error": null, "host_state": {"active_view": "Level 1"}}),
    );

    let result = bridge(&cli, None, &scripts)
        .run(ExecutionRequest::new("print(\"hi\")"))
        .await;

    assert!(result.succeeded, "unexpected failure: {:?}", result.error);
    assert_eq!(result.output, "hi\n");
    assert_eq!(result.origin, ResultOrigin::Structured);
    assert_eq!(result.transport.as_deref(), Some("process"));
    assert_eq!(result.host_state["active_view"], "Level 1");

    // probe, then run
    let calls = cli_invocations(dir.path());
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], "--version");
    assert!(calls[1].starts_with("run "));
    assert_eq!(entries(&scripts), 0, "temporary script left behind");
}

#[cfg(unix)]
#[tokio::test]
async fn test_refused_socket_falls_back_to_process() {
    let dir = tempfile::tempdir().unwrap();
    let cli = canned_host_cli(dir.path(), &json!({"success": true, "output": "from cli\n"}));
    let port = refused_port().await;

    let result = bridge(&cli, Some(port), &dir.path().join("scripts"))
        .run(ExecutionRequest::new("x = 1"))
        .await;

    assert!(result.succeeded);
    assert_eq!(result.output, "from cli\n");
    assert_eq!(result.transport.as_deref(), Some("process"));
}

#[tokio::test]
async fn test_socket_transport_used_when_reachable() {
    let dir = tempfile::tempdir().unwrap();
    let (port, host) = spawn_socket_host(|_| harness_frame("hi\n")).await;

    let result = bridge(&dir.path().join("no-such-cli"), Some(port), &dir.path().join("scripts"))
        .run(ExecutionRequest::new("print(\"hi\")"))
        .await;

    assert!(result.succeeded, "unexpected failure: {:?}", result.error);
    assert_eq!(result.output, "hi\n");
    assert_eq!(result.transport.as_deref(), Some("socket"));
    assert_eq!(result.origin, ResultOrigin::Structured);

    let request = host.await.unwrap();
    assert_eq!(request["action"], "execute");
    assert!(request["code"].as_str().unwrap().contains("print(\"hi\")"));
    assert!(request["id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_denied_code_never_reaches_a_transport() {
    let dir = tempfile::tempdir().unwrap();
    let cli = canned_host_cli(dir.path(), &json!({"success": true, "output": ""}));

    for code in ["eval('1 + 1')", "__import__('os')", "data = open('x').read()"] {
        let result = bridge(&cli, None, &dir.path().join("scripts"))
            .run(ExecutionRequest::new(code))
            .await;

        assert!(!result.succeeded);
        assert_eq!(result.status, ExecutionStatus::ValidationFailed);
        assert!(result.transport.is_none());
    }

    assert!(cli_invocations(dir.path()).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_syntax_error_is_rejected_before_execution() {
    let dir = tempfile::tempdir().unwrap();
    let cli = canned_host_cli(dir.path(), &json!({"success": true}));

    let result = bridge(&cli, None, &dir.path().join("scripts"))
        .run(ExecutionRequest::new("if True:\nprint('x')"))
        .await;

    assert_eq!(result.status, ExecutionStatus::ValidationFailed);
    assert!(result.error.unwrap().contains("Syntax error"));
    assert!(cli_invocations(dir.path()).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_is_reported_and_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("scripts");
    let cli = fake_host_cli(dir.path(), "    exec sleep 5");

    let started = Instant::now();
    let result = bridge(&cli, None, &scripts)
        .run(ExecutionRequest::new("x = 1").with_timeout(Duration::from_secs(1)))
        .await;
    let elapsed = started.elapsed();

    assert!(!result.succeeded);
    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert_eq!(result.error.as_deref(), Some("timed out after 1s"));
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);
    assert_eq!(entries(&scripts), 0, "temporary script left behind");
}

#[cfg(unix)]
#[tokio::test]
async fn test_hanging_version_check_bounded_by_its_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("scripts");
    let cli = hanging_version_cli(dir.path());

    let started = Instant::now();
    let result = bridge_with_check_timeout(&cli, None, &scripts, Duration::from_secs(1))
        .run(ExecutionRequest::new("x = 1").with_timeout(Duration::from_secs(10)))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result.status, ExecutionStatus::HostUnavailable);
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);
    assert_eq!(cli_invocations(dir.path()), vec!["--version".to_string()]);
    assert_eq!(entries(&scripts), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_hanging_version_check_bounded_by_request_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("scripts");
    let cli = hanging_version_cli(dir.path());

    let started = Instant::now();
    let result = bridge_with_check_timeout(&cli, None, &scripts, Duration::from_secs(10))
        .run(ExecutionRequest::new("x = 1").with_timeout(Duration::from_secs(1)))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert_eq!(result.error.as_deref(), Some("timed out after 1s"));
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);
    assert_eq!(cli_invocations(dir.path()), vec!["--version".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unframed_output_is_marked_raw() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_host_cli(dir.path(), "    echo 'plain output'\n    exit 0");

    let result = bridge(&cli, None, &dir.path().join("scripts"))
        .run(ExecutionRequest::new("x = 1").with_capture_output(false))
        .await;

    assert!(result.succeeded);
    assert_eq!(result.origin, ResultOrigin::RawOutput);
    assert!(result.output.contains("plain output"));
    assert_eq!(result.exit_code, Some(0));
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_cli_reports_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let cli = fake_host_cli(dir.path(), "    echo 'Revit is not running' >&2\n    exit 3");

    let result = bridge(&cli, None, &dir.path().join("scripts"))
        .run(ExecutionRequest::new("x = 1"))
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.exit_code, Some(3));
    assert!(result.error.unwrap().contains("Revit is not running"));
}

#[tokio::test]
async fn test_missing_cli_reports_host_unavailable() {
    let dir = tempfile::tempdir().unwrap();

    let result = bridge(&dir.path().join("no-such-cli"), None, &dir.path().join("scripts"))
        .run(ExecutionRequest::new("x = 1"))
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.status, ExecutionStatus::HostUnavailable);
    assert!(result.error.unwrap().contains("PATH"));
}

/// Runs the real capture harness when a Python interpreter is present
#[cfg(unix)]
#[tokio::test]
async fn test_capture_harness_under_python() {
    if !python3_available() {
        eprintln!("python3 not found, skipping");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let cli = fake_host_cli(dir.path(), "    exec python3 \"$2\"");
    let run = |code: &'static str| {
        let bridge = bridge(&cli, None, &dir.path().join("scripts"));
        async move { bridge.run(ExecutionRequest::new(code)).await }
    };

    let result = run("print(\"hi\")").await;
    assert!(result.succeeded, "unexpected failure: {:?}", result.error);
    assert_eq!(result.output, "hi\n");
    assert_eq!(result.origin, ResultOrigin::Structured);
    assert!(result.error.is_none());

    let result = run("import sys\nprint('hi')\nsys.stderr.write('careful: deprecated\\n')").await;
    assert!(result.succeeded, "unexpected failure: {:?}", result.error);
    assert_eq!(result.output, "hi\n");
    assert_eq!(result.error.as_deref(), Some("careful: deprecated\n"));

    let result = run("print('before')\nraise ValueError('boom')").await;
    assert!(!result.succeeded);
    assert_eq!(result.error.as_deref(), Some("boom"));
    assert_eq!(result.output, "before\n");
}
