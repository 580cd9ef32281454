//! Execution bridge input and output types

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::time::Duration;

/// Default per-execution timeout
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest timeout a single execution may ask for
pub const MAX_EXECUTION_TIMEOUT: Duration = Duration::from_secs(3600);

/// Code submitted to the automation host
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub code: String,
    pub timeout: Duration,
    pub capture_output: bool,
}

impl ExecutionRequest {
    /// Request with default timeout and output capture enabled
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            timeout: DEFAULT_EXECUTION_TIMEOUT,
            capture_output: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_capture_output(mut self, capture_output: bool) -> Self {
        self.capture_output = capture_output;
        self
    }
}

/// Coarse outcome of one execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
    ValidationFailed,
    HostUnavailable,
}

/// How the result was recovered from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    /// Parsed from the sentinel-delimited payload
    Structured,
    /// Taken from the host's socket response frame
    HostFrame,
    /// Heuristic reconstruction from raw stdout/stderr and exit code
    RawOutput,
    /// Nothing reached the host (screen rejection, timeout, unavailable host)
    None,
}

/// Terminal artifact of one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub status: ExecutionStatus,
    pub output: String,
    pub error: Option<String>,
    #[serde(default)]
    pub host_state: Map<String, Value>,
    #[serde(rename = "elapsed_secs", with = "duration_secs")]
    pub elapsed: Duration,
    pub origin: ResultOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
}

impl ExecutionResult {
    /// Successful execution
    pub fn success(output: String, host_state: Map<String, Value>, origin: ResultOrigin) -> Self {
        Self {
            succeeded: true,
            status: ExecutionStatus::Success,
            output,
            error: None,
            host_state,
            elapsed: Duration::ZERO,
            origin,
            exit_code: None,
            transport: None,
        }
    }

    /// Failed execution with the given status
    pub fn failure(status: ExecutionStatus, error: impl Into<String>) -> Self {
        debug_assert!(status != ExecutionStatus::Success);
        Self {
            succeeded: false,
            status,
            output: String::new(),
            error: Some(error.into()),
            host_state: Map::new(),
            elapsed: Duration::ZERO,
            origin: ResultOrigin::None,
            exit_code: None,
            transport: None,
        }
    }

    /// Code rejected by the static screen before any transport ran
    pub fn validation_failed(reason: impl std::fmt::Display) -> Self {
        Self::failure(
            ExecutionStatus::ValidationFailed,
            format!("Code validation failed: {}", reason),
        )
    }

    /// Transport did not finish within `timeout`
    pub fn timed_out(timeout: Duration) -> Self {
        Self::failure(
            ExecutionStatus::Timeout,
            format!("timed out after {}s", format_secs(timeout)),
        )
    }

    pub fn host_unavailable(reason: impl Into<String>) -> Self {
        Self::failure(ExecutionStatus::HostUnavailable, reason)
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_host_state(mut self, host_state: Map<String, Value>) -> Self {
        self.host_state = host_state;
        self
    }

    pub fn with_origin(mut self, origin: ResultOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_transport(mut self, transport: &str) -> Self {
        self.transport = Some(transport.to_string());
        self
    }
}

/// Whole seconds when exact, one decimal otherwise
fn format_secs(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        d.as_secs().to_string()
    } else {
        format!("{:.1}", d.as_secs_f64())
    }
}

mod duration_secs {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
