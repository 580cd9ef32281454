//! Tool dispatcher
//!
//! Resolves a tool, checks required parameters, fills defaults and runs the
//! handler. Handler failures come back as failed outcomes so that one bad
//! tool call cannot abort the conversation.

use crate::errors::{AgentError, Result};
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{ToolInvocation, ToolOutcome};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Dispatches tool invocations against a shared registry
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Invoke one tool.
    ///
    /// Returns `UnknownTool` or `MissingParameter` without touching the
    /// handler. Every other path yields a [`ToolOutcome`].
    pub async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutcome> {
        let ToolInvocation {
            tool_name,
            mut arguments,
            invocation_id,
        } = invocation;

        let tool = match self.registry.resolve(&tool_name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = %tool_name, invocation_id = %invocation_id, "unknown tool requested");
                return Err(e);
            }
        };

        if let Some(missing) = tool
            .descriptor
            .required_parameters()
            .into_iter()
            .find(|name| !arguments.contains_key(*name))
        {
            warn!(
                tool = %tool_name,
                invocation_id = %invocation_id,
                parameter = missing,
                "missing required parameter"
            );
            return Err(AgentError::MissingParameter {
                tool: tool_name.clone(),
                parameter: missing.to_string(),
            });
        }

        for param in &tool.descriptor.parameters {
            if let Some(default) = &param.default {
                arguments
                    .entry(param.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        let start = Instant::now();
        let outcome = match tool.handler.call(&arguments).await {
            Ok(payload) => ToolOutcome::success(&invocation_id, &tool_name, payload),
            Err(e) => ToolOutcome::failure(&invocation_id, &tool_name, e.to_string()),
        };

        info!(
            tool = %tool_name,
            invocation_id = %invocation_id,
            success = outcome.succeeded,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tool invoked"
        );

        Ok(outcome)
    }

    /// Invoke and fold dispatch errors into a failed outcome
    pub async fn invoke_absorbing(&self, invocation: ToolInvocation) -> ToolOutcome {
        let invocation_id = invocation.invocation_id.clone();
        let tool_name = invocation.tool_name.clone();
        match self.invoke(invocation).await {
            Ok(outcome) => outcome,
            Err(e) => ToolOutcome::failure(invocation_id, tool_name, e.to_string()),
        }
    }
}
