//! Timeout and stream-decoding settings.

use serde::{Deserialize, Serialize};

/// Deadlines applied while reading a response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutSettings {
    /// Time allowed between sending the request and the first chunk (ms).
    pub first_chunk_timeout_ms: u64,
    /// Time allowed between two consecutive chunks (ms).
    pub idle_timeout_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            first_chunk_timeout_ms: 90_000,
            idle_timeout_ms: 30_000,
        }
    }
}

/// Stream decoding settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    /// Context window size in tokens, used to turn a context-usage percentage
    /// into input tokens.
    pub context_window: u64,
    /// Emit `retry` events before each retry wait.
    pub emit_retry_events: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            context_window: 200_000,
            emit_retry_events: true,
        }
    }
}
