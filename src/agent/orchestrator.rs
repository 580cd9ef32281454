//! Agent orchestrator
//!
//! Drives one request through the [`TurnState`] machine:
//! - first model call with the tool advertisement
//! - sequential dispatch of every requested tool call
//! - one final model call without tools
//!
//! Completion API faults abort the request. Tool faults never do.

use crate::agent::state::{TurnEvent, TurnState};
use crate::errors::{AgentError, Result};
use crate::llm::{CompletionClient, CompletionRequest, CompletionResponse, ToolSpec};
use crate::tools::{ToolDispatcher, ToolInvocation, ToolOutcome};
use crate::types::{ContentBlock, ConversationTurn};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an expert Revit API developer assistant. You help users automate Revit \
with Python through the Revit API and pyRevit.

When writing code:
- Wrap every document modification in a Transaction
- Import what you use from the Autodesk.Revit modules
- Use FilteredElementCollector and the selection API to find elements
- Keep Revit internal units in mind when reading or setting values
- Take the user's context (active view, selection, worksharing) into account
- Put the code in a single ```python fenced block and explain it briefly

Tools:
- generate_revit_code: produce Revit API boilerplate from a description
- execute_pyrevit_script: run code in the live Revit session. It changes the \
user's model, so only use it when the user asks for the code to be run.";

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Completion model name
    pub model: String,

    /// Maximum tokens per model response
    pub max_tokens: u32,

    /// Default sampling temperature
    pub temperature: f64,

    /// Default system prompt
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// One inbound request
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub prompt: String,

    /// Caller-supplied prior turns
    pub history: Vec<ConversationTurn>,

    /// Overrides the configured system prompt
    pub system_prompt: Option<String>,

    /// Overrides the configured temperature
    pub temperature: Option<f64>,
}

impl AgentRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Result of one orchestrated request
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutput {
    /// Text of the last model call
    pub content: String,

    /// Outcomes of the dispatch round, in request order
    pub tool_outcomes: Vec<ToolOutcome>,

    /// Failed tool calls, one line each
    pub warnings: Vec<String>,

    pub model_calls: usize,

    pub final_state: TurnState,

    pub request_id: String,
}

/// Main agent orchestrator
pub struct AgentOrchestrator {
    client: Arc<dyn CompletionClient>,
    dispatcher: ToolDispatcher,
    config: AgentConfig,
}

impl AgentOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, dispatcher: ToolDispatcher, config: AgentConfig) -> Self {
        Self {
            client,
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one request to completion
    pub async fn run(&self, request: AgentRequest) -> Result<AgentOutput> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("agent_request", request_id = %request_id);
        self.drive(request, request_id).instrument(span).await
    }

    async fn drive(&self, request: AgentRequest, request_id: String) -> Result<AgentOutput> {
        if request.prompt.trim().is_empty() {
            return Err(AgentError::Validation("prompt must not be empty".to_string()));
        }

        let temperature = request.temperature.unwrap_or(self.config.temperature);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(AgentError::Validation(format!(
                "temperature must be within 0.0-1.0, got {}",
                temperature
            )));
        }

        let system_prompt = request
            .system_prompt
            .unwrap_or_else(|| self.config.system_prompt.clone());

        let tool_specs: Vec<ToolSpec> = self
            .dispatcher
            .registry()
            .list()
            .into_iter()
            .map(ToolSpec::from)
            .collect();

        let mut messages = request.history;
        messages.push(ConversationTurn::user(request.prompt));

        let mut state = TurnState::initial();
        let mut model_calls = 0;
        let mut content = String::new();
        let mut pending: Vec<ToolInvocation> = Vec::new();
        let mut tool_outcomes: Vec<ToolOutcome> = Vec::new();

        while !state.is_terminal() {
            debug!(state = state.display_name(), "turn step");
            let tools = state.tools_advertised().then(|| tool_specs.clone());

            state = match state {
                TurnState::AwaitModel => {
                    let response = self
                        .call_model(&messages, &system_prompt, temperature, tools)
                        .await?;
                    model_calls += 1;
                    content = response.text();
                    pending = response.tool_invocations();

                    if pending.is_empty() {
                        state.transition(TurnEvent::NoToolCalls)?
                    } else {
                        info!(tool_calls = pending.len(), "model requested tools");
                        messages.push(ConversationTurn::assistant_blocks(response.content));
                        state.transition(TurnEvent::ToolCallsRequested)?
                    }
                }

                TurnState::Dispatching => {
                    let mut results = Vec::with_capacity(pending.len());
                    for invocation in pending.drain(..) {
                        let outcome = self.dispatcher.invoke_absorbing(invocation).await;
                        results.push(ContentBlock::ToolResult {
                            tool_use_id: outcome.invocation_id.clone(),
                            content: outcome.payload.to_string(),
                            is_error: !outcome.succeeded,
                        });
                        tool_outcomes.push(outcome);
                    }
                    messages.push(ConversationTurn::user_blocks(results));
                    state.transition(TurnEvent::OutcomesCollected)?
                }

                TurnState::AwaitFinalModel => {
                    let response = self
                        .call_model(&messages, &system_prompt, temperature, tools)
                        .await?;
                    model_calls += 1;
                    content = response.text();

                    let ignored = response.tool_invocations().len();
                    if ignored > 0 {
                        warn!(ignored, "tool calls in final reply ignored");
                    }
                    state.transition(TurnEvent::FinalReply)?
                }

                TurnState::Done => break,
            };
        }

        let warnings: Vec<String> = tool_outcomes
            .iter()
            .filter(|o| !o.succeeded)
            .map(|o| {
                format!(
                    "tool '{}' failed: {}",
                    o.tool_name,
                    o.error_message().unwrap_or("unknown error")
                )
            })
            .collect();

        info!(
            model_calls,
            tool_calls = tool_outcomes.len(),
            failed_tools = warnings.len(),
            "request complete"
        );

        Ok(AgentOutput {
            content,
            tool_outcomes,
            warnings,
            model_calls,
            final_state: state,
            request_id,
        })
    }

    async fn call_model(
        &self,
        messages: &[ConversationTurn],
        system_prompt: &str,
        temperature: f64,
        tools: Option<Vec<ToolSpec>>,
    ) -> Result<CompletionResponse> {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature,
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
            tools,
        };

        self.client.complete(&request).await.map_err(|e| {
            warn!(error = %e, "completion call failed");
            match e {
                AgentError::UpstreamModel(_) => e,
                other => AgentError::UpstreamModel(other.to_string()),
            }
        })
    }
}
