//! Fake automation hosts shared by the integration tests

#![allow(dead_code)]

use revbot::bridge::harness::{RESULT_END, RESULT_START};
use revbot::bridge::{BridgeConfig, ExecutionBridge};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Sentinel-framed report as the capture harness prints it
pub fn framed_report(report: &Value) -> String {
    format!("{}\n{}\n{}\n", RESULT_START, report, RESULT_END)
}

/// Write an executable `/bin/sh` script standing in for the host CLI.
///
/// `--version` prints a version line; `run <path>` executes `run_body`
/// with the script path in `$2`. Every invocation is appended to
/// `<dir>/invocations.log`.
#[cfg(unix)]
pub fn fake_host_cli(dir: &Path, run_body: &str) -> PathBuf {
    scripted_host_cli(dir, "    echo 'pyRevit CLI v4.8.16'", run_body)
}

/// Fake host CLI whose `--version` never answers in time
#[cfg(unix)]
pub fn hanging_version_cli(dir: &Path) -> PathBuf {
    scripted_host_cli(dir, "    exec sleep 5", "    echo 'should not run'")
}

#[cfg(unix)]
fn scripted_host_cli(dir: &Path, version_body: &str, run_body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log = dir.join("invocations.log");
    let path = dir.join("fake-pyrevit");
    let script = format!(
        "#!/bin/sh\necho \"$@\" >> '{log}'\ncase \"$1\" in\n  --version)\n{version}\n    ;;\n  run)\n{body}\n    ;;\n  *) exit 2 ;;\nesac\n",
        log = log.display(),
        version = version_body,
        body = run_body,
    );
    std::fs::write(&path, script).expect("write fake cli");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod fake cli");
    path
}

/// Lines the fake CLI logged, one per invocation
pub fn cli_invocations(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("invocations.log"))
        .map(|log| log.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Fake CLI that answers every `run` with a canned harness report
#[cfg(unix)]
pub fn canned_host_cli(dir: &Path, report: &Value) -> PathBuf {
    let body = format!("    printf 'loading revit...\\n'\n    cat <<'REPORT'\n{}REPORT", framed_report(report));
    fake_host_cli(dir, &body)
}

/// Whether a Python 3 interpreter is on PATH
pub fn python3_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// One-shot socket host: answers the first request frame with `reply(frame)`
/// and hands the request back through the join handle.
pub async fn spawn_socket_host<F>(reply: F) -> (u16, JoinHandle<Value>)
where
    F: FnOnce(&Value) -> Value + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (read, mut write) = stream.into_split();
        let mut line = String::new();
        BufReader::new(read).read_line(&mut line).await.expect("read frame");

        let request: Value = serde_json::from_str(&line).expect("request frame is JSON");
        let mut frame = reply(&request).to_string();
        frame.push('\n');
        write.write_all(frame.as_bytes()).await.expect("write frame");
        request
    });

    (port, handle)
}

/// Socket host reply carrying a harness report in its `output` field
pub fn harness_frame(output: &str) -> Value {
    json!({
        "status": "ok",
        "output": format!(
            "pyRevit engine ready\n{}",
            framed_report(&json!({"success": true, "output": output, "error": null, "host_state": {"active_view": "Level 1"}}))
        ),
    })
}

/// A local port nothing listens on
pub async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

pub fn bridge(cli: &Path, socket_port: Option<u16>, scripts_dir: &Path) -> ExecutionBridge {
    bridge_with_check_timeout(cli, socket_port, scripts_dir, Duration::from_secs(5))
}

pub fn bridge_with_check_timeout(
    cli: &Path,
    socket_port: Option<u16>,
    scripts_dir: &Path,
    probe_timeout: Duration,
) -> ExecutionBridge {
    ExecutionBridge::new(&BridgeConfig {
        cli_program: cli.display().to_string(),
        socket: socket_port.map(|port| ("127.0.0.1".to_string(), port)),
        scripts_dir: scripts_dir.to_path_buf(),
        probe_timeout,
    })
}

/// Number of entries left in a directory (0 if it does not exist)
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
