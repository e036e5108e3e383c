//! # Tool Call Assembler
//!
//! Reduces classified tool events into complete invocations.
//!
//! At most one call is "current". Completed calls are archived in order and
//! never mutated again. At finalize, archived calls whose accumulated input
//! is empty or is not a JSON object are dropped with a warning; the rest of
//! the pipeline is unaffected.

use kestrel_core::ToolCall;
use kestrel_core::text::truncate_str;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::classify::WireEvent;

/// Bytes of raw input included in diagnostics.
const INPUT_PREVIEW_BYTES: usize = 200;

/// One tool call being assembled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallState {
    /// Upstream tool use ID.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Raw argument JSON text accumulated so far.
    pub input: String,
    /// Whether more input may still arrive.
    pub open: bool,
}

/// Why an archived call was dropped.
#[derive(Debug, thiserror::Error)]
pub enum ToolInputError {
    /// No input arrived; treated as a truncated stream.
    #[error("tool input is empty")]
    Empty,
    /// The input is not valid JSON.
    #[error("tool input is not valid JSON: {0}")]
    Invalid(#[from] serde_json::Error),
    /// The input parsed but is not an object.
    #[error("tool input is not a JSON object")]
    NotAnObject,
}

/// Parse a call's accumulated input into arguments.
pub fn parse_tool_input(input: &str) -> Result<Map<String, Value>, ToolInputError> {
    if input.trim().is_empty() {
        return Err(ToolInputError::Empty);
    }
    match serde_json::from_str::<Value>(input)? {
        Value::Object(map) => Ok(map),
        _ => Err(ToolInputError::NotAnObject),
    }
}

/// Stateful reducer over tool-related [`WireEvent`]s.
#[derive(Clone, Debug, Default)]
pub struct ToolCallAssembler {
    current: Option<ToolCallState>,
    completed: Vec<ToolCallState>,
}

impl ToolCallAssembler {
    /// Empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Non-tool events are ignored.
    pub fn apply(&mut self, event: &WireEvent) {
        match event {
            WireEvent::ToolUse {
                name,
                tool_use_id,
                input,
                stop,
            } => {
                let continues = self
                    .current
                    .as_ref()
                    .is_some_and(|current| current.id == *tool_use_id);
                if continues {
                    if let Some(current) = self.current.as_mut() {
                        current.input.push_str(input);
                    }
                } else {
                    self.archive_current();
                    debug!(tool_call_id = %tool_use_id, tool_name = %name, "tool call started");
                    self.current = Some(ToolCallState {
                        id: tool_use_id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                        open: true,
                    });
                }
                if *stop {
                    self.archive_current();
                }
            }
            WireEvent::ToolUseInput(fragment) => match self.current.as_mut() {
                Some(current) => current.input.push_str(fragment),
                None => debug!(len = fragment.len(), "tool input with no open call, dropping"),
            },
            WireEvent::ToolUseStop(true) => self.archive_current(),
            _ => {}
        }
    }

    /// The open call, if any.
    pub fn current(&self) -> Option<&ToolCallState> {
        self.current.as_ref()
    }

    /// Archived calls in completion order.
    pub fn completed(&self) -> &[ToolCallState] {
        &self.completed
    }

    /// Archive any open call and return the calls whose input parses.
    pub fn finish(&mut self) -> Vec<ToolCall> {
        self.archive_current();
        self.completed
            .iter()
            .filter_map(|state| match parse_tool_input(&state.input) {
                Ok(arguments) => Some(ToolCall {
                    id: state.id.clone(),
                    name: state.name.clone(),
                    arguments,
                }),
                Err(ToolInputError::Empty) => {
                    warn!(
                        tool_call_id = %state.id,
                        tool_name = %state.name,
                        "dropping tool call with empty input, stream likely truncated"
                    );
                    None
                }
                Err(e) => {
                    warn!(
                        tool_call_id = %state.id,
                        tool_name = %state.name,
                        error = %e,
                        input_preview = truncate_str(&state.input, INPUT_PREVIEW_BYTES),
                        "dropping tool call with unparseable input"
                    );
                    None
                }
            })
            .collect()
    }

    fn archive_current(&mut self) {
        if let Some(mut state) = self.current.take() {
            state.open = false;
            self.completed.push(state);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_fragment;
    use assert_matches::assert_matches;

    fn feed(fragments: &[&str]) -> ToolCallAssembler {
        let mut assembler = ToolCallAssembler::new();
        for fragment in fragments {
            if let Some(event) = classify_fragment(fragment) {
                assembler.apply(&event);
            }
        }
        assembler
    }

    #[test]
    fn chunked_input_assembles() {
        let mut assembler = feed(&[
            r#"{"name":"write","toolUseId":"tc1","input":{}}"#,
            r#"{"input":"{\"path\":\"f.md\"}"}"#,
            r#"{"stop":true}"#,
        ]);
        let calls = assembler.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "write");
        assert_eq!(calls[0].id, "tc1");
        assert_eq!(calls[0].arguments["path"], "f.md");
    }

    #[test]
    fn single_fragment_with_stop() {
        let assembler = feed(&[r#"{"name":"bash","toolUseId":"tc1","input":"{\"cmd\":\"ls\"}","stop":true}"#]);
        assert!(assembler.current().is_none());
        assert_eq!(assembler.completed().len(), 1);
        assert!(!assembler.completed()[0].open);
    }

    #[test]
    fn same_id_appends() {
        let mut assembler = feed(&[
            r#"{"name":"bash","toolUseId":"tc1","input":"{\"cmd\":"}"#,
            r#"{"name":"bash","toolUseId":"tc1","input":"\"ls\"}"}"#,
        ]);
        assert_eq!(assembler.current().map(|c| c.input.as_str()), Some(r#"{"cmd":"ls"}"#));
        assert_eq!(assembler.finish().len(), 1);
    }

    #[test]
    fn new_id_archives_previous() {
        let mut assembler = feed(&[
            r#"{"name":"a","toolUseId":"tc1","input":"{}"}"#,
            r#"{"name":"b","toolUseId":"tc2","input":"{\"x\":1}"}"#,
        ]);
        assert_eq!(assembler.completed().len(), 1);
        let calls = assembler.finish();
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn input_without_current_is_noop() {
        let assembler = feed(&[r#"{"input":"{\"x\":1}"}"#]);
        assert!(assembler.current().is_none());
        assert!(assembler.completed().is_empty());
    }

    #[test]
    fn stop_false_keeps_call_open() {
        let assembler = feed(&[
            r#"{"name":"a","toolUseId":"tc1","input":""}"#,
            r#"{"stop":false}"#,
        ]);
        assert!(assembler.current().is_some());
    }

    #[test]
    fn empty_input_dropped() {
        let mut assembler = feed(&[r#"{"name":"write","toolUseId":"tc1","input":{},"stop":true}"#]);
        assert!(assembler.finish().is_empty());
    }

    #[test]
    fn invalid_input_dropped_others_survive() {
        let mut assembler = feed(&[
            r#"{"name":"a","toolUseId":"tc1","input":"{\"broken\":","stop":true}"#,
            r#"{"name":"b","toolUseId":"tc2","input":"{\"ok\":true}","stop":true}"#,
        ]);
        let calls = assembler.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "b");
    }

    #[test]
    fn parse_errors() {
        assert_matches!(parse_tool_input("  "), Err(ToolInputError::Empty));
        assert_matches!(parse_tool_input("{oops"), Err(ToolInputError::Invalid(_)));
        assert_matches!(parse_tool_input("[1]"), Err(ToolInputError::NotAnObject));
        assert_matches!(parse_tool_input("{}"), Ok(map) if map.is_empty());
    }
}
