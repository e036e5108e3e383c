//! # Bracket Fallback Extractor
//!
//! Recovers tool calls that the model wrote inline as
//! `[Called <name> with args: {...}]` instead of emitting tool events.
//!
//! Matching is strict: the `{` must follow the anchor immediately, the object
//! must balance and parse, and only whitespace may sit between its closing
//! brace and the `]`. A rejected match leaves the text untouched.

use std::ops::Range;
use std::sync::LazyLock;

use kestrel_core::ToolCall;
use regex::Regex;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::frame::find_balanced_end;

static CALL_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[Called ([A-Za-z0-9_-]+) with args: ").expect("valid regex pattern")
});

/// Result of a successful extraction.
#[derive(Clone, Debug, PartialEq)]
pub struct BracketExtraction {
    /// Text with every accepted call removed, trimmed.
    pub text: String,
    /// Calls in the order they appear.
    pub calls: Vec<ToolCall>,
}

/// Extract inline bracket tool calls from finalized answer text.
///
/// Returns `None` when nothing was accepted.
pub fn extract_bracket_calls(text: &str) -> Option<BracketExtraction> {
    let mut accepted: Vec<(Range<usize>, ToolCall)> = Vec::new();
    let mut cursor = 0;

    while let Some(captures) = CALL_ANCHOR.captures_at(text, cursor) {
        let (Some(anchor), Some(name)) = (captures.get(0), captures.get(1)) else {
            break;
        };
        match accept_call(text, anchor.end()) {
            Some((end, arguments)) => {
                accepted.push((
                    anchor.start()..end,
                    ToolCall {
                        id: format!("toolu_{}", Uuid::now_v7().simple()),
                        name: name.as_str().to_owned(),
                        arguments,
                    },
                ));
                cursor = end;
            }
            None => {
                debug!(tool_name = name.as_str(), offset = anchor.start(), "rejected bracket call");
                // `[` is one byte, so this stays on a char boundary.
                cursor = anchor.start() + 1;
            }
        }
    }

    if accepted.is_empty() {
        return None;
    }

    let mut cleaned = text.to_owned();
    for (range, _) in accepted.iter().rev() {
        cleaned.replace_range(range.clone(), "");
    }
    Some(BracketExtraction {
        text: cleaned.trim().to_owned(),
        calls: accepted.into_iter().map(|(_, call)| call).collect(),
    })
}

/// Validate the object starting at `open` and the closing `]` after it.
///
/// Returns the offset one past `]` and the parsed arguments.
fn accept_call(text: &str, open: usize) -> Option<(usize, serde_json::Map<String, Value>)> {
    let close = find_balanced_end(text, open)?;
    let after = close + 1;
    let rest = &text[after..];
    let gap = rest.len() - rest.trim_start().len();
    if !rest[gap..].starts_with(']') {
        return None;
    }
    match serde_json::from_str::<Value>(&text[open..after]) {
        Ok(Value::Object(arguments)) => Some((after + gap + 1, arguments)),
        Ok(_) | Err(_) => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_call_removed() {
        let out = extract_bracket_calls(r#"Running it. [Called bash with args: {"cmd":"ls"}]"#).unwrap();
        assert_eq!(out.text, "Running it.");
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].name, "bash");
        assert_eq!(out.calls[0].arguments["cmd"], "ls");
        assert!(out.calls[0].id.starts_with("toolu_"));
    }

    #[test]
    fn multiple_calls_removed_in_order() {
        let text = r#"A [Called read with args: {"path":"a"}] B [Called write-file with args: {"path":"b","body":"}]"}] C"#;
        let out = extract_bracket_calls(text).unwrap();
        assert_eq!(out.text, "A  B  C");
        let names: Vec<_> = out.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["read", "write-file"]);
        assert_eq!(out.calls[1].arguments["body"], "}]");
        assert_ne!(out.calls[0].id, out.calls[1].id);
    }

    #[test]
    fn whitespace_before_closing_bracket_allowed() {
        let out = extract_bracket_calls("[Called x with args: {\"a\":1}  \n]").unwrap();
        assert_eq!(out.text, "");
        assert_eq!(out.calls.len(), 1);
    }

    #[test]
    fn gap_before_brace_rejects() {
        assert!(extract_bracket_calls(r#"[Called x with args:  {"a":1}]"#).is_none());
    }

    #[test]
    fn missing_bracket_rejects() {
        assert!(extract_bracket_calls(r#"[Called x with args: {"a":1} trailing]"#).is_none());
    }

    #[test]
    fn unbalanced_rejects() {
        assert!(extract_bracket_calls(r#"[Called x with args: {"a":1"#).is_none());
    }

    #[test]
    fn unparseable_rejects_but_later_match_accepted() {
        let text = r#"[Called a with args: {a:1}] then [Called b with args: {"ok":true}]"#;
        let out = extract_bracket_calls(text).unwrap();
        assert_eq!(out.text, "[Called a with args: {a:1}] then");
        assert_eq!(out.calls.len(), 1);
        assert_eq!(out.calls[0].name, "b");
    }

    #[test]
    fn plain_text_untouched() {
        assert!(extract_bracket_calls("no calls here").is_none());
    }
}
