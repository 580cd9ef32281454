//! pyRevit script execution tool
//!
//! Thin adapter from tool arguments to [`ExecutionBridge::run`]. The bridge
//! result is returned as the payload whether or not the script succeeded;
//! only malformed arguments produce a handler error.

use crate::bridge::ExecutionBridge;
use crate::errors::{AgentError, Result};
use crate::tools::handler::ToolHandler;
use crate::tools::types::{ParameterSpec, ParameterType, ToolDescriptor};
use crate::types::{ExecutionRequest, MAX_EXECUTION_TIMEOUT};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub const TOOL_NAME: &str = "execute_pyrevit_script";

pub fn descriptor(default_timeout: Duration) -> ToolDescriptor {
    ToolDescriptor::new(
        TOOL_NAME,
        "Execute Python code in Revit using pyRevit. Code runs in the context of the active Revit document.",
        vec![
            ParameterSpec::required(
                "code",
                ParameterType::String,
                "Python code to execute in Revit",
            ),
            ParameterSpec::optional(
                "timeout",
                ParameterType::Number,
                "Execution timeout in seconds",
                Some(json!(default_timeout.as_secs())),
            ),
            ParameterSpec::optional(
                "capture_output",
                ParameterType::Boolean,
                "Whether to capture and return script output",
                Some(json!(true)),
            ),
        ],
    )
}

/// Runs scripts through the execution bridge
pub struct ScriptExecutor {
    bridge: Arc<ExecutionBridge>,
    default_timeout: Duration,
}

impl ScriptExecutor {
    pub fn new(bridge: Arc<ExecutionBridge>, default_timeout: Duration) -> Self {
        Self {
            bridge,
            default_timeout,
        }
    }

    fn parse_request(&self, arguments: &Map<String, Value>) -> Result<ExecutionRequest> {
        let code = arguments
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Validation("code must be a string".to_string()))?;

        let timeout = match arguments.get("timeout") {
            None | Some(Value::Null) => self.default_timeout,
            Some(value) => {
                let secs = value.as_f64().ok_or_else(|| {
                    AgentError::Validation(format!("timeout must be a number, got {}", value))
                })?;
                if !(secs > 0.0) {
                    return Err(AgentError::Validation(format!(
                        "timeout must be positive, got {}",
                        secs
                    )));
                }
                if secs > MAX_EXECUTION_TIMEOUT.as_secs_f64() {
                    return Err(AgentError::Validation(format!(
                        "timeout must be at most {} seconds, got {}",
                        MAX_EXECUTION_TIMEOUT.as_secs(),
                        secs
                    )));
                }
                Duration::try_from_secs_f64(secs)
                    .map_err(|e| AgentError::Validation(format!("invalid timeout: {}", e)))?
            }
        };

        let capture_output = match arguments.get("capture_output") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(AgentError::Validation(format!(
                    "capture_output must be a boolean, got {}",
                    other
                )))
            }
        };

        Ok(ExecutionRequest::new(code)
            .with_timeout(timeout)
            .with_capture_output(capture_output))
    }
}

#[async_trait]
impl ToolHandler for ScriptExecutor {
    async fn call(&self, arguments: &Map<String, Value>) -> Result<Value> {
        let request = self.parse_request(arguments)?;
        let result = self.bridge.run(request).await;
        Ok(serde_json::to_value(result)?)
    }
}
