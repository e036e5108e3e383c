//! Content block types.
//!
//! An assistant message is an ordered list of these blocks. Each block maps to
//! one output slot in the produced event sequence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content that can appear in an assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantContent {
    /// Answer text.
    #[serde(rename = "text")]
    Text {
        /// The text.
        text: String,
    },
    /// Reasoning narration split out of the answer.
    #[serde(rename = "thinking")]
    Thinking {
        /// The thinking text.
        thinking: String,
    },
    /// A completed tool invocation.
    #[serde(rename = "toolCall")]
    ToolCall {
        /// Tool call ID.
        id: String,
        /// Tool name.
        name: String,
        /// Parsed tool arguments.
        arguments: Map<String, Value>,
    },
}

impl AssistantContent {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a thinking block.
    #[must_use]
    pub fn thinking(thinking: impl Into<String>) -> Self {
        Self::Thinking {
            thinking: thinking.into(),
        }
    }

    /// Returns `true` if this is a text block.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Returns `true` if this is a thinking block.
    #[must_use]
    pub fn is_thinking(&self) -> bool {
        matches!(self, Self::Thinking { .. })
    }

    /// Returns `true` if this is a tool call block.
    #[must_use]
    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCall { .. })
    }

    /// Text of a text block.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_serializes_with_type_tag() {
        let block = AssistantContent::text("hi");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn tool_call_serializes_as_tool_call() {
        let mut arguments = Map::new();
        let _ = arguments.insert("path".into(), json!("f.md"));
        let block = AssistantContent::ToolCall {
            id: "tc1".into(),
            name: "write".into(),
            arguments,
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "toolCall");
        assert_eq!(value["arguments"]["path"], "f.md");
    }

    #[test]
    fn predicates() {
        assert!(AssistantContent::text("a").is_text());
        assert!(AssistantContent::thinking("a").is_thinking());
        assert!(!AssistantContent::thinking("a").is_tool_call());
        assert_eq!(AssistantContent::text("a").as_text(), Some("a"));
        assert_eq!(AssistantContent::thinking("a").as_text(), None);
    }
}
