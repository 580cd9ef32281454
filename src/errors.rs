//! Error types for RevBot
//!
//! One taxonomy for the whole crate. The execution bridge and the tool
//! dispatcher convert downstream faults into result objects; only the
//! variants that reach the orchestrator boundary are surfaced to callers.

use thiserror::Error;

/// Main error type for the RevBot broker
#[derive(Error, Debug)]
pub enum AgentError {
    /// Caller-supplied code or parameters failed static checks
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Tool name not present in the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Required tool parameter absent from the call arguments
    #[error("Missing required parameter '{parameter}' for tool '{tool}'")]
    MissingParameter { tool: String, parameter: String },

    /// External automation host unreachable
    #[error("Host unavailable: {0}")]
    HostUnavailable(String),

    /// Stage-scoped timeout
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Completion API fault (never retried locally)
    #[error("Upstream model error: {0}")]
    UpstreamModel(String),

    /// State machine transition errors
    #[error("Invalid state transition from {from} ({event}): {reason}")]
    InvalidTransition {
        from: String,
        event: String,
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for broker operations
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Whether the caller can fix this by changing the request
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            AgentError::Validation(_)
                | AgentError::UnknownTool(_)
                | AgentError::MissingParameter { .. }
        )
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Generic(err.to_string())
    }
}
