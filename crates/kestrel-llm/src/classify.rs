//! # Event Classifier
//!
//! Maps one parsed wire fragment to a [`WireEvent`].
//!
//! Field names overlap across event kinds, so classification walks an
//! ordered rule table and the first matching rule wins. The order in
//! [`CLASSIFY_RULES`] is significant: an object carrying `toolUseId` and
//! `stop` but no `name` is a [`WireEvent::ToolUseStop`], not a tool start.

use serde_json::{Map, Value};
use tracing::debug;

use crate::frame::starts_with_anchor;

/// One classified upstream fragment.
#[derive(Clone, Debug, PartialEq)]
pub enum WireEvent {
    /// Answer text (possibly containing thinking tags).
    Content(String),
    /// Tool call start, or continuation when `tool_use_id` matches the open call.
    ToolUse {
        /// Tool name.
        name: String,
        /// Upstream tool use ID.
        tool_use_id: String,
        /// Raw argument JSON text fragment.
        input: String,
        /// Whether this fragment also closes the call.
        stop: bool,
    },
    /// Argument text continuation for the open call.
    ToolUseInput(String),
    /// Tool call close signal.
    ToolUseStop(bool),
    /// Percentage of the context window consumed.
    ContextUsage(f64),
    /// Suggested follow-up prompt. Consumed but never acted on.
    FollowupPrompt(String),
    /// Explicit token usage.
    Usage {
        /// Input tokens, when reported.
        input_tokens: Option<u64>,
        /// Output tokens, when reported.
        output_tokens: Option<u64>,
    },
}

/// Kind of [`WireEvent`] a rule produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireEventKind {
    /// [`WireEvent::Content`]
    Content,
    /// [`WireEvent::ToolUse`]
    ToolUse,
    /// [`WireEvent::ToolUseInput`]
    ToolUseInput,
    /// [`WireEvent::ToolUseStop`]
    ToolUseStop,
    /// [`WireEvent::ContextUsage`]
    ContextUsage,
    /// [`WireEvent::FollowupPrompt`]
    FollowupPrompt,
    /// [`WireEvent::Usage`]
    Usage,
}

type Fields = Map<String, Value>;

/// A predicate and the builder it selects.
pub struct ClassifyRule {
    /// Kind produced on match.
    pub kind: WireEventKind,
    /// Whether the rule applies to an object.
    pub matches: fn(&Fields) -> bool,
    build: fn(&Fields) -> Option<WireEvent>,
}

/// Classification rules in precedence order.
pub static CLASSIFY_RULES: [ClassifyRule; 7] = [
    ClassifyRule {
        kind: WireEventKind::Content,
        matches: |obj| has(obj, "content"),
        build: |obj| Some(WireEvent::Content(text_of(obj.get("content")))),
    },
    ClassifyRule {
        kind: WireEventKind::ToolUse,
        matches: |obj| has(obj, "name") && has(obj, "toolUseId"),
        build: build_tool_use,
    },
    ClassifyRule {
        kind: WireEventKind::ToolUseInput,
        matches: |obj| has(obj, "input") && !has(obj, "name"),
        build: |obj| Some(WireEvent::ToolUseInput(text_of(obj.get("input")))),
    },
    ClassifyRule {
        kind: WireEventKind::ToolUseStop,
        matches: |obj| has(obj, "stop") && !has(obj, "contextUsagePercentage"),
        build: |obj| Some(WireEvent::ToolUseStop(truthy(obj.get("stop")))),
    },
    ClassifyRule {
        kind: WireEventKind::ContextUsage,
        matches: |obj| has(obj, "contextUsagePercentage"),
        build: |obj| {
            obj.get("contextUsagePercentage")
                .and_then(Value::as_f64)
                .map(WireEvent::ContextUsage)
        },
    },
    ClassifyRule {
        kind: WireEventKind::FollowupPrompt,
        matches: |obj| has(obj, "followupPrompt"),
        build: |obj| Some(WireEvent::FollowupPrompt(text_of(obj.get("followupPrompt")))),
    },
    ClassifyRule {
        kind: WireEventKind::Usage,
        matches: |obj| obj.get("usage").is_some_and(Value::is_object),
        build: |obj| {
            let usage = obj.get("usage")?;
            Some(WireEvent::Usage {
                input_tokens: usage.get("inputTokens").and_then(Value::as_u64),
                output_tokens: usage.get("outputTokens").and_then(Value::as_u64),
            })
        },
    },
];

/// Classify a parsed JSON value. Non-objects and unknown shapes yield `None`.
pub fn classify(value: &Value) -> Option<WireEvent> {
    let obj = value.as_object()?;
    let rule = CLASSIFY_RULES.iter().find(|rule| (rule.matches)(obj))?;
    let event = (rule.build)(obj);
    if event.is_none() {
        debug!(kind = ?rule.kind, "fragment matched rule but had an unusable shape");
    }
    event
}

/// Which rule an object matches, without building the event.
pub fn classify_kind(value: &Value) -> Option<WireEventKind> {
    let obj = value.as_object()?;
    CLASSIFY_RULES
        .iter()
        .find(|rule| (rule.matches)(obj))
        .map(|rule| rule.kind)
}

/// Parse and classify one fragment of raw text.
///
/// The text must begin with a known anchor; unparseable text is dropped.
pub fn classify_fragment(text: &str) -> Option<WireEvent> {
    if !starts_with_anchor(text) {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value) => classify(&value),
        Err(e) => {
            debug!(error = %e, len = text.len(), "dropping unparseable fragment");
            None
        }
    }
}

fn has(obj: &Fields, key: &str) -> bool {
    obj.get(key).is_some_and(|v| !v.is_null())
}

fn truthy(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(false)
}

/// String values as-is, anything else as its JSON text.
fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn build_tool_use(obj: &Fields) -> Option<WireEvent> {
    let name = obj.get("name")?.as_str()?.to_owned();
    let tool_use_id = text_of(obj.get("toolUseId"));
    // Later input fragments are appended as raw JSON text, so `{}` must not
    // seed the accumulator.
    let input = match obj.get("input") {
        Some(Value::Object(map)) if map.is_empty() => String::new(),
        other => text_of(other),
    };
    Some(WireEvent::ToolUse {
        name,
        tool_use_id,
        input,
        stop: truthy(obj.get("stop")),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
