//! Execution bridge
//!
//! Ships code to the automation host. Every run goes through the same
//! gates: static screen, optional capture harness, then an ordered list of
//! transports sharing one deadline. `run` always returns an
//! [`ExecutionResult`]; transport faults never escape it.

pub mod harness;
pub mod screen;
pub mod syntax;
pub mod transport;

use crate::errors::AgentError;
use crate::types::{ExecutionRequest, ExecutionResult, ExecutionStatus};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use transport::{ProcessTransport, RawOutcome, SocketTransport, Transport, TransportError};

/// Where and how to reach the host
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Host CLI executable
    pub cli_program: String,

    /// Persistent channel endpoint, if the host exposes one
    pub socket: Option<(String, u16)>,

    /// Directory for temporary scripts
    pub scripts_dir: PathBuf,

    /// Upper bound on the `--version` availability probe
    pub probe_timeout: Duration,
}

/// Screens, wraps and runs code on the host
pub struct ExecutionBridge {
    transports: Vec<Box<dyn Transport>>,
}

impl ExecutionBridge {
    /// Socket first when configured, then the host CLI
    pub fn new(config: &BridgeConfig) -> Self {
        let mut transports: Vec<Box<dyn Transport>> = Vec::new();
        if let Some((host, port)) = &config.socket {
            transports.push(Box::new(SocketTransport::new(host, *port)));
        }
        transports.push(Box::new(ProcessTransport::new(
            config.cli_program.clone(),
            config.scripts_dir.clone(),
            config.probe_timeout,
        )));
        Self { transports }
    }

    /// Bridge over an explicit transport order
    pub fn with_transports(transports: Vec<Box<dyn Transport>>) -> Self {
        Self { transports }
    }

    pub fn transport_names(&self) -> Vec<&'static str> {
        self.transports.iter().map(|t| t.name()).collect()
    }

    pub async fn run(&self, request: ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();

        if let Err(e) = screen::screen(&request.code) {
            let reason = match e {
                AgentError::Validation(msg) => msg,
                other => other.to_string(),
            };
            warn!(reason = %reason, "code rejected before execution");
            return ExecutionResult::validation_failed(reason).with_elapsed(started.elapsed());
        }

        let prepared = if request.capture_output {
            harness::wrap(&request.code)
        } else {
            request.code.clone()
        };

        let Some(deadline) = started.checked_add(request.timeout) else {
            warn!(timeout = ?request.timeout, "timeout out of range");
            return ExecutionResult::validation_failed(format!(
                "timeout {:?} is out of range",
                request.timeout
            ))
            .with_elapsed(started.elapsed());
        };
        let mut unavailable = Vec::new();

        for transport in &self.transports {
            let name = transport.name();
            debug!(transport = name, "attempting transport");

            let result = match transport.execute(&prepared, deadline).await {
                Ok(RawOutcome::Frame(frame)) => harness::from_frame(frame),
                Ok(RawOutcome::Process {
                    stdout,
                    stderr,
                    exit_code,
                }) => harness::from_process(&stdout, &stderr, exit_code),
                Err(TransportError::Unavailable(reason)) => {
                    warn!(transport = name, reason = %reason, "transport unavailable, trying next");
                    unavailable.push(format!("{}: {}", name, reason));
                    continue;
                }
                Err(TransportError::TimedOut) => ExecutionResult::timed_out(request.timeout),
                Err(TransportError::HostUnavailable(reason)) => ExecutionResult::host_unavailable(reason),
                Err(TransportError::Failed(reason)) => {
                    ExecutionResult::failure(ExecutionStatus::Error, reason)
                }
            };

            let result = result.with_transport(name).with_elapsed(started.elapsed());
            info!(
                transport = name,
                success = result.succeeded,
                status = ?result.status,
                origin = ?result.origin,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "execution finished"
            );
            return result;
        }

        let reason = if unavailable.is_empty() {
            "no execution transport configured".to_string()
        } else {
            format!("all transports unavailable ({})", unavailable.join("; "))
        };
        warn!(reason = %reason, "execution not attempted");
        ExecutionResult::host_unavailable(reason).with_elapsed(started.elapsed())
    }
}
