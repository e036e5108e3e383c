//! Output message assembly with slot boundary events.
//!
//! Each content kind gets one output slot, allocated lazily on its first
//! non-empty delta. A slot's start event precedes its deltas, and its end
//! event carries the accumulated string and is emitted at most once.
//!
//! Slot indices are unique within a call. [`MessageBuilder::restart`] drops
//! the content of an abandoned attempt; its slots stay unclosed and the next
//! attempt numbers its slots after them.

use kestrel_core::{AssistantContent, StreamEvent, ToolCall};

use crate::thinking::Segment;

/// Position of a slot in the current attempt's content.
#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    position: Option<usize>,
    closed: bool,
}

/// Builds the assistant message content while emitting slot events.
#[derive(Clone, Debug, Default)]
pub struct MessageBuilder {
    content: Vec<AssistantContent>,
    /// Slot indices used by abandoned attempts.
    base: usize,
    text: Slot,
    thinking: Slot,
}

impl MessageBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one segmenter output.
    pub fn apply(&mut self, segment: Segment) -> Vec<StreamEvent> {
        match segment {
            Segment::Text(delta) => self.push_text(delta),
            Segment::Thinking(delta) => self.push_thinking(delta),
            Segment::ThinkingEnd => self.close_thinking().into_iter().collect(),
        }
    }

    /// Append answer text.
    pub fn push_text(&mut self, delta: String) -> Vec<StreamEvent> {
        if delta.is_empty() || self.text.closed {
            return Vec::new();
        }
        let mut events = Vec::with_capacity(2);
        let position = match self.text.position {
            Some(position) => position,
            None => {
                let position = self.allocate(AssistantContent::text(""));
                self.text.position = Some(position);
                events.push(StreamEvent::TextStart {
                    content_index: self.base + position,
                });
                position
            }
        };
        if let Some(AssistantContent::Text { text }) = self.content.get_mut(position) {
            text.push_str(&delta);
        }
        events.push(StreamEvent::TextDelta {
            content_index: self.base + position,
            delta,
        });
        events
    }

    /// Append thinking text.
    pub fn push_thinking(&mut self, delta: String) -> Vec<StreamEvent> {
        if delta.is_empty() || self.thinking.closed {
            return Vec::new();
        }
        let mut events = Vec::with_capacity(2);
        let position = match self.thinking.position {
            Some(position) => position,
            None => {
                let position = self.allocate(AssistantContent::thinking(""));
                self.thinking.position = Some(position);
                events.push(StreamEvent::ThinkingStart {
                    content_index: self.base + position,
                });
                position
            }
        };
        if let Some(AssistantContent::Thinking { thinking }) = self.content.get_mut(position) {
            thinking.push_str(&delta);
        }
        events.push(StreamEvent::ThinkingDelta {
            content_index: self.base + position,
            delta,
        });
        events
    }

    /// Close the thinking slot, if one was opened.
    pub fn close_thinking(&mut self) -> Option<StreamEvent> {
        let position = self.thinking.position?;
        if self.thinking.closed {
            return None;
        }
        self.thinking.closed = true;
        let thinking = match self.content.get(position) {
            Some(AssistantContent::Thinking { thinking }) => thinking.clone(),
            _ => String::new(),
        };
        Some(StreamEvent::ThinkingEnd {
            content_index: self.base + position,
            thinking,
        })
    }

    /// Close the text slot, if one was opened.
    pub fn close_text(&mut self) -> Option<StreamEvent> {
        let position = self.text.position?;
        if self.text.closed {
            return None;
        }
        self.text.closed = true;
        Some(StreamEvent::TextEnd {
            content_index: self.base + position,
            text: self.text().unwrap_or_default().to_owned(),
        })
    }

    /// Accumulated answer text, if a text slot exists.
    pub fn text(&self) -> Option<&str> {
        self.content
            .get(self.text.position?)
            .and_then(AssistantContent::as_text)
    }

    /// Replace the accumulated answer text before the slot closes.
    pub fn replace_text(&mut self, replacement: String) {
        if let Some(AssistantContent::Text { text }) = self
            .text
            .position
            .and_then(|position| self.content.get_mut(position))
        {
            *text = replacement;
        }
    }

    /// Add a completed tool call as its own slot: start, one delta with the
    /// full argument JSON, end.
    pub fn push_tool_call(&mut self, call: ToolCall) -> Vec<StreamEvent> {
        let content_index = self.base + self.allocate(AssistantContent::from(call.clone()));
        let arguments_delta = serde_json::Value::Object(call.arguments.clone()).to_string();
        vec![
            StreamEvent::ToolCallStart {
                content_index,
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
            },
            StreamEvent::ToolCallDelta {
                content_index,
                tool_call_id: call.id.clone(),
                arguments_delta,
            },
            StreamEvent::ToolCallEnd {
                content_index,
                tool_call: call,
            },
        ]
    }

    /// Discard the current content before a new attempt replays the response.
    pub fn restart(&mut self) {
        self.base += self.content.len();
        self.content.clear();
        self.text = Slot::default();
        self.thinking = Slot::default();
    }

    /// Text and thinking the model generated, in slot order.
    pub fn generated_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                AssistantContent::Text { text } => Some(text.as_str()),
                AssistantContent::Thinking { thinking } => Some(thinking.as_str()),
                AssistantContent::ToolCall { .. } => None,
            })
            .collect()
    }

    /// Content committed so far.
    pub fn content(&self) -> &[AssistantContent] {
        &self.content
    }

    /// Take the content, leaving the builder empty.
    pub fn into_content(self) -> Vec<AssistantContent> {
        self.content
    }

    fn allocate(&mut self, block: AssistantContent) -> usize {
        self.content.push(block);
        self.content.len() - 1
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
