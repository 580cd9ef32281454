//! Completion API abstraction
//!
//! The orchestrator talks to the model only through [`CompletionClient`],
//! so tests can swap in a scripted client.

pub mod anthropic;

use crate::errors::Result;
use crate::tools::{ToolDescriptor, ToolInvocation};
use crate::types::{ContentBlock, ConversationTurn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use anthropic::AnthropicClient;

/// Tool advertisement in the completion API's format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<&ToolDescriptor> for ToolSpec {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema(),
        }
    }
}

/// One completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub system_prompt: String,
    pub messages: Vec<ConversationTurn>,
    /// `None` means no tools are advertised
    pub tools: Option<Vec<ToolSpec>>,
}

/// Ordered content segments returned by the model
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
}

impl CompletionResponse {
    /// Concatenated text segments
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool-call requests, in the order the model emitted them
    pub fn tool_invocations(&self) -> Vec<ToolInvocation> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolInvocation::new(name.clone(), input.clone(), id.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_mixes_text_and_tool_calls() {
        let response = CompletionResponse {
            content: vec![
                ContentBlock::text("Let me "),
                ContentBlock::ToolUse {
                    id: "t1".into(),
                    name: "a".into(),
                    input: json!({"x": 1}),
                },
                ContentBlock::text("check."),
                ContentBlock::ToolUse {
                    id: "t2".into(),
                    name: "b".into(),
                    input: json!({}),
                },
            ],
            stop_reason: Some("tool_use".into()),
        };

        assert_eq!(response.text(), "Let me check.");
        let calls = response.tool_invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].invocation_id, "t1");
        assert_eq!(calls[1].tool_name, "b");
    }
}
