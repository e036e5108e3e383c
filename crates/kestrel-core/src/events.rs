//! Events produced by one streaming call.
//!
//! A call yields `start`, then per-slot `*_start` / `*_delta` / `*_end`
//! triples, optional `retry` notices, and exactly one terminal event
//! (`done` or `error`). `content_index` identifies the output slot; a slot's
//! start always precedes its deltas, which precede its end.

use serde::{Deserialize, Serialize};

use crate::messages::{AssistantMessage, StopReason, ToolCall};

/// Events emitted during response streaming.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Stream started.
    #[serde(rename = "start")]
    Start,

    /// Text slot opened.
    #[serde(rename = "text_start")]
    TextStart {
        /// Output slot index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
    },

    /// Incremental answer text.
    #[serde(rename = "text_delta")]
    TextDelta {
        /// Output slot index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Text fragment.
        delta: String,
    },

    /// Text slot closed.
    ///
    /// `text` is the final answer text. When inline `[Called ...]` tool calls
    /// were recovered from it, they are removed here but were already present
    /// in the slot's earlier deltas.
    #[serde(rename = "text_end")]
    TextEnd {
        /// Output slot index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Final accumulated text.
        text: String,
    },

    /// Thinking slot opened.
    #[serde(rename = "thinking_start")]
    ThinkingStart {
        /// Output slot index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
    },

    /// Incremental thinking text.
    #[serde(rename = "thinking_delta")]
    ThinkingDelta {
        /// Output slot index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Thinking fragment.
        delta: String,
    },

    /// Thinking slot closed.
    #[serde(rename = "thinking_end")]
    ThinkingEnd {
        /// Output slot index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Final accumulated thinking text.
        thinking: String,
    },

    /// Tool call slot opened.
    #[serde(rename = "toolcall_start")]
    ToolCallStart {
        /// Output slot index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        name: String,
    },

    /// Tool call argument JSON.
    #[serde(rename = "toolcall_delta")]
    ToolCallDelta {
        /// Output slot index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Argument JSON text.
        #[serde(rename = "argumentsDelta")]
        arguments_delta: String,
    },

    /// Tool call slot closed.
    #[serde(rename = "toolcall_end")]
    ToolCallEnd {
        /// Output slot index.
        #[serde(rename = "contentIndex")]
        content_index: usize,
        /// Complete tool call.
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },

    /// A retryable failure occurred and a new attempt follows after `delay_ms`.
    #[serde(rename = "retry")]
    Retry {
        /// Retry number (1-based).
        attempt: u32,
        /// Maximum retries configured.
        #[serde(rename = "maxRetries")]
        max_retries: u32,
        /// Delay before the next attempt in ms.
        #[serde(rename = "delayMs")]
        delay_ms: u64,
        /// Retry strategy (`"reduce"` or `"backoff"`).
        strategy: String,
        /// What failed.
        error: RetryErrorInfo,
    },

    /// Stream completed successfully.
    #[serde(rename = "done")]
    Done {
        /// Stop reason (`stop`, `toolUse` or `length`).
        reason: StopReason,
        /// Full assistant message.
        message: AssistantMessage,
    },

    /// Stream failed or was aborted.
    #[serde(rename = "error")]
    Error {
        /// Stop reason (`error` or `aborted`).
        reason: StopReason,
        /// Partial assistant message with content committed before the failure.
        message: AssistantMessage,
        /// Error description.
        error: String,
        /// Upstream status details when the failure was a non-success response.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        http: Option<HttpErrorInfo>,
    },
}

impl StreamEvent {
    /// Whether this event ends the sequence.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Output slot this event belongs to, if any.
    #[must_use]
    pub fn content_index(&self) -> Option<usize> {
        match self {
            Self::TextStart { content_index }
            | Self::TextDelta { content_index, .. }
            | Self::TextEnd { content_index, .. }
            | Self::ThinkingStart { content_index }
            | Self::ThinkingDelta { content_index, .. }
            | Self::ThinkingEnd { content_index, .. }
            | Self::ToolCallStart { content_index, .. }
            | Self::ToolCallDelta { content_index, .. }
            | Self::ToolCallEnd { content_index, .. } => Some(*content_index),
            Self::Start | Self::Retry { .. } | Self::Done { .. } | Self::Error { .. } => None,
        }
    }
}

/// Error info attached to a [`StreamEvent::Retry`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryErrorInfo {
    /// Error category string.
    pub category: String,
    /// Human-readable message.
    pub message: String,
}

/// Upstream response details attached to a terminal [`StreamEvent::Error`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorInfo {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase.
    #[serde(rename = "statusText")]
    pub status_text: String,
    /// Raw response body.
    pub body: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn wire_type_tags() {
        let event = StreamEvent::TextDelta {
            content_index: 0,
            delta: "hi".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "text_delta");
        assert_eq!(json["contentIndex"], 0);
        assert_eq!(json["delta"], "hi");
    }

    #[test]
    fn done_carries_reason() {
        let event = StreamEvent::Done {
            reason: StopReason::ToolUse,
            message: AssistantMessage::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["reason"], "toolUse");
    }

    #[test]
    fn terminal_events() {
        assert!(!StreamEvent::Start.is_terminal());
        assert!(
            StreamEvent::Error {
                reason: StopReason::Aborted,
                message: AssistantMessage::default(),
                error: "aborted".into(),
                http: None,
            }
            .is_terminal()
        );
    }

    #[test]
    fn content_index_lookup() {
        let event = StreamEvent::ThinkingEnd {
            content_index: 2,
            thinking: String::new(),
        };
        assert_eq!(event.content_index(), Some(2));
        assert_eq!(StreamEvent::Start.content_index(), None);
    }

    #[test]
    fn deserialize_roundtrip_retry() {
        let json = r#"{"type":"retry","attempt":1,"maxRetries":3,"delayMs":1000,"strategy":"backoff","error":{"category":"rate_limit","message":"HTTP 429"}}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert_matches!(event, StreamEvent::Retry { attempt: 1, delay_ms: 1000, .. });
    }

    #[test]
    fn error_http_details_serialized_when_present() {
        let event = StreamEvent::Error {
            reason: StopReason::Error,
            message: AssistantMessage::default(),
            error: "HTTP 429 Too Many Requests: slow down".into(),
            http: Some(HttpErrorInfo {
                status: 429,
                status_text: "Too Many Requests".into(),
                body: "slow down".into(),
            }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["http"]["status"], 429);
        assert_eq!(json["http"]["statusText"], "Too Many Requests");
        assert_eq!(json["http"]["body"], "slow down");

        let aborted = StreamEvent::Error {
            reason: StopReason::Aborted,
            message: AssistantMessage::default(),
            error: "Request aborted".into(),
            http: None,
        };
        let json = serde_json::to_value(&aborted).unwrap();
        assert!(json.get("http").is_none());
    }
}
