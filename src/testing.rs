//! Test doubles for the completion API and tool handlers
//!
//! Used by unit tests and by the integration tests under `tests/`.

use crate::errors::{AgentError, Result};
use crate::llm::{CompletionClient, CompletionRequest, CompletionResponse};
use crate::tools::ToolHandler;
use crate::types::ContentBlock;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted model reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Reply(CompletionResponse),
    Fail(String),
}

/// Completion client replaying canned replies in order and recording every
/// request. Running out of replies is an upstream failure.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self::from_replies(responses.into_iter().map(ScriptedReply::Reply).collect())
    }

    /// Script that may include failures
    pub fn from_replies(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| AgentError::Generic("scripted client poisoned".to_string()))?
            .pop_front();

        match next {
            Some(ScriptedReply::Reply(response)) => Ok(response),
            Some(ScriptedReply::Fail(msg)) => Err(AgentError::UpstreamModel(msg)),
            None => Err(AgentError::UpstreamModel("no scripted reply left".to_string())),
        }
    }
}

/// Text-only model response
pub fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        content: vec![ContentBlock::text(text)],
        stop_reason: Some("end_turn".to_string()),
    }
}

/// Response with optional text followed by tool calls `(id, name, input)`
pub fn tool_call_response(text: &str, calls: &[(&str, &str, Value)]) -> CompletionResponse {
    let mut content = Vec::new();
    if !text.is_empty() {
        content.push(ContentBlock::text(text));
    }
    content.extend(calls.iter().map(|(id, name, input)| ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input: input.clone(),
    }));

    CompletionResponse {
        content,
        stop_reason: Some("tool_use".to_string()),
    }
}

/// Handler returning a fixed payload and recording its arguments
#[derive(Debug)]
pub struct RecordingHandler {
    payload: Value,
    calls: Mutex<Vec<Map<String, Value>>>,
}

impl RecordingHandler {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Map<String, Value>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ToolHandler for RecordingHandler {
    async fn call(&self, arguments: &Map<String, Value>) -> Result<Value> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(arguments.clone());
        }
        Ok(self.payload.clone())
    }
}

/// Handler that always fails with the given message
#[derive(Debug)]
pub struct FailingHandler {
    message: String,
}

impl FailingHandler {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for FailingHandler {
    async fn call(&self, _arguments: &Map<String, Value>) -> Result<Value> {
        Err(AgentError::Generic(self.message.clone()))
    }
}
