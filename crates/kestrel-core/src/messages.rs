//! Assistant message, usage accounting, and stop reasons.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::AssistantContent;

/// Why a response ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Normal completion.
    #[default]
    Stop,
    /// The model requested one or more tool invocations.
    ToolUse,
    /// The response is believed to have hit an upstream length cap.
    Length,
    /// The caller cancelled the request.
    Aborted,
    /// The request failed.
    Error,
}

impl StopReason {
    /// Wire string for this stop reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::ToolUse => "toolUse",
            Self::Length => "length",
            Self::Aborted => "aborted",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage for one response.
///
/// `total_tokens` is derived; construct through [`Usage::new`] or call
/// [`Usage::recompute_total`] after mutating the counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Input (prompt) tokens.
    pub input: u64,
    /// Output (completion) tokens.
    pub output: u64,
    /// Always `input + output`.
    pub total_tokens: u64,
}

impl Usage {
    /// Create a usage record with the total derived from its parts.
    #[must_use]
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total_tokens: input.saturating_add(output),
        }
    }

    /// Re-derive `total_tokens` from `input` and `output`.
    pub fn recompute_total(&mut self) {
        self.total_tokens = self.input.saturating_add(self.output);
    }
}

/// A completed tool invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool call ID.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Parsed tool arguments.
    pub arguments: Map<String, Value>,
}

impl From<ToolCall> for AssistantContent {
    fn from(call: ToolCall) -> Self {
        Self::ToolCall {
            id: call.id,
            name: call.name,
            arguments: call.arguments,
        }
    }
}

/// The assistant message produced by one streaming call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessage {
    /// Content blocks in slot order.
    pub content: Vec<AssistantContent>,
    /// Token usage.
    pub usage: Usage,
    /// Why the response ended.
    pub stop_reason: StopReason,
    /// Error description when `stop_reason` is `error` or `aborted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AssistantMessage {
    /// Concatenated text of all text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(AssistantContent::as_text)
            .collect()
    }

    /// Concatenated text of all thinking blocks.
    #[must_use]
    pub fn thinking(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                AssistantContent::Thinking { thinking } => Some(thinking.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All tool calls, in content order.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                AssistantContent::ToolCall {
                    id,
                    name,
                    arguments,
                } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
