//! One-shot host CLI transport
//!
//! Probes the CLI with `--version`, writes the prepared code to a temporary
//! script and runs `<cli> run <script>`. The script file is a
//! `NamedTempFile` owned by the call, so it is removed on every exit path,
//! timeouts included. Children are spawned with `kill_on_drop`.

use super::{RawOutcome, Transport, TransportError};
use crate::errors::{AgentError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

/// Check that the host CLI can be started. Returns its version string.
pub async fn probe_host_cli(program: &str, limit: Duration) -> Result<String> {
    let child = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AgentError::HostUnavailable(format!(
                "'{}' not found. Install pyRevit and ensure the '{}' command is in PATH.",
                program, program
            )));
        }
        Err(e) => {
            return Err(AgentError::HostUnavailable(format!(
                "failed to start '{}': {}",
                program, e
            )));
        }
    };

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(AgentError::HostUnavailable(format!(
                "'{} --version' failed: {}",
                program, e
            )))
        }
        Err(_) => return Err(AgentError::Timeout { secs: limit.as_secs() }),
    };

    if !output.status.success() {
        return Err(AgentError::HostUnavailable(format!(
            "'{} --version' exited with {}. Install pyRevit and ensure it is working and in PATH.",
            program, output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Runs scripts through the host CLI
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    program: String,
    scripts_dir: PathBuf,
    probe_timeout: Duration,
}

impl ProcessTransport {
    pub fn new(program: impl Into<String>, scripts_dir: impl Into<PathBuf>, probe_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            scripts_dir: scripts_dir.into(),
            probe_timeout,
        }
    }

    async fn probe(&self, deadline: Instant) -> std::result::Result<(), TransportError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let limit = self.probe_timeout.min(remaining);

        match probe_host_cli(&self.program, limit).await {
            Ok(version) => {
                debug!(program = %self.program, version = %version, "host CLI found");
                Ok(())
            }
            Err(AgentError::Timeout { .. }) if Instant::now() >= deadline => Err(TransportError::TimedOut),
            Err(e) => Err(TransportError::HostUnavailable(e.to_string())),
        }
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn execute(&self, code: &str, deadline: Instant) -> std::result::Result<RawOutcome, TransportError> {
        self.probe(deadline).await?;

        tokio::fs::create_dir_all(&self.scripts_dir).await.map_err(|e| {
            TransportError::Failed(format!(
                "cannot create scripts directory {}: {}",
                self.scripts_dir.display(),
                e
            ))
        })?;

        let script = tempfile::Builder::new()
            .prefix("revbot_")
            .suffix(".py")
            .tempfile_in(&self.scripts_dir)
            .map_err(|e| TransportError::Failed(format!("cannot create script file: {}", e)))?;

        tokio::fs::write(script.path(), code)
            .await
            .map_err(|e| TransportError::Failed(format!("cannot write script file: {}", e)))?;

        info!(program = %self.program, script = %script.path().display(), "running host CLI");

        let child = Command::new(&self.program)
            .arg("run")
            .arg(script.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TransportError::HostUnavailable(format!("failed to start '{}': {}", self.program, e))
            })?;

        let output = match timeout_at(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(TransportError::Failed(format!("host CLI wait failed: {}", e))),
            Err(_) => {
                warn!(program = %self.program, "host CLI timed out, killing");
                return Err(TransportError::TimedOut);
            }
        };

        if let Err(e) = script.close() {
            warn!(error = %e, "failed to remove temporary script");
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(
            exit_code = ?output.status.code(),
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "host CLI finished"
        );

        Ok(RawOutcome::Process {
            stdout,
            stderr,
            exit_code: output.status.code(),
        })
    }
}
