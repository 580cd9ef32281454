//! Execution transports
//!
//! A transport ships prepared code to the host and hands back whatever came
//! out. Interpreting that output is the harness's job.

pub mod process;
pub mod socket;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

pub use process::{probe_host_cli, ProcessTransport};
pub use socket::SocketTransport;

/// Raw material returned by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutcome {
    /// One JSON response frame from the persistent channel
    Frame(Value),

    /// Captured output of a finished host CLI process
    Process {
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },
}

/// Transport faults. Only `Unavailable` lets the bridge move on to the next
/// transport; the rest end the attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Connection-level failure: refused, closed early, unreadable frame
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("deadline reached")]
    TimedOut,

    /// The host itself cannot be reached or started
    #[error("{0}")]
    HostUnavailable(String),

    #[error("transport failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs and result metadata
    fn name(&self) -> &'static str;

    /// Run prepared code, finishing by `deadline`
    async fn execute(&self, code: &str, deadline: Instant) -> Result<RawOutcome, TransportError>;
}
