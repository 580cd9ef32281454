//! Conversation types exchanged with the completion API
//!
//! Turns are shaped like the wire format so the orchestrator can append the
//! raw assistant response and the tool-result turn without re-encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single content segment inside a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Free text
    Text { text: String },

    /// Model request to invoke a tool
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },

    /// Tool outcome fed back to the model, correlated by invocation id
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },

    /// Segment kinds this broker does not interpret
    #[serde(other)]
    Unsupported,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// Turn body: plain text (caller history) or structured segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One entry of the ordered conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: TurnContent,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
        }
    }

    /// Assistant turn echoing a raw model response. Segment kinds the API
    /// would reject on the way back in are dropped.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        let blocks = blocks
            .into_iter()
            .filter(|b| !matches!(b, ContentBlock::Unsupported))
            .collect();
        Self {
            role: Role::Assistant,
            content: TurnContent::Blocks(blocks),
        }
    }

    /// Synthetic user turn carrying tool results
    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Blocks(blocks),
        }
    }

    /// Concatenated free text of this turn
    pub fn text(&self) -> String {
        match &self.content {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_turn_deserializes_from_plain_text() {
        let turn: ConversationTurn =
            serde_json::from_value(json!({"role": "user", "content": "hello"})).unwrap();
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.text(), "hello");
    }

    #[test]
    fn test_tool_use_block_wire_shape() {
        let block = ContentBlock::ToolUse {
            id: "toolu_1".to_string(),
            name: "generate_revit_code".to_string(),
            input: json!({"description": "walls"}),
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(value["id"], "toolu_1");
        assert_eq!(value["input"]["description"], "walls");
    }

    #[test]
    fn test_tool_result_omits_false_error_flag() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "{}".to_string(),
            is_error: false,
        };
        let value = serde_json::to_value(&block).unwrap();
        assert!(value.get("is_error").is_none());
    }

    #[test]
    fn test_unknown_block_kind_is_tolerated() {
        let blocks: Vec<ContentBlock> = serde_json::from_value(json!([
            {"type": "thinking", "thinking": "hmm"},
            {"type": "text", "text": "done"}
        ]))
        .unwrap();
        assert_eq!(blocks[0], ContentBlock::Unsupported);

        let turn = ConversationTurn::assistant_blocks(blocks);
        match &turn.content {
            TurnContent::Blocks(b) => assert_eq!(b.len(), 1),
            _ => panic!("expected blocks"),
        }
        assert_eq!(turn.text(), "done");
    }
}
