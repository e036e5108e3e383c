//! Request-size bounds.
//!
//! The orchestrator never trims request content itself. It hands a reduction
//! factor to the request builder, which applies [`RequestLimits::scaled`] to
//! these bounds before building the next attempt's body.

use serde::{Deserialize, Serialize};

/// Minimum number of tool specs kept after scaling.
pub const MIN_TOOL_COUNT: usize = 3;

/// Upper bounds on outbound request content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestLimits {
    /// Conversation history messages kept.
    pub max_history_messages: usize,
    /// Characters kept per tool result.
    pub max_tool_result_chars: usize,
    /// Characters kept of the system prompt.
    pub max_system_prompt_chars: usize,
    /// Tool specs sent.
    pub max_tools: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_history_messages: 100,
            max_tool_result_chars: 50_000,
            max_system_prompt_chars: 100_000,
            max_tools: 64,
        }
    }
}

impl RequestLimits {
    /// Scale every bound by `factor` (clamped to `(0, 1]`).
    ///
    /// Bounds round down and never drop below 1; the tool count never drops
    /// below [`MIN_TOOL_COUNT`] unless it started lower.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        if !factor.is_finite() || factor >= 1.0 {
            return *self;
        }
        let factor = factor.max(f64::MIN_POSITIVE);
        let scale = |bound: usize| ((bound as f64 * factor).floor() as usize).max(1);
        Self {
            max_history_messages: scale(self.max_history_messages),
            max_tool_result_chars: scale(self.max_tool_result_chars),
            max_system_prompt_chars: scale(self.max_system_prompt_chars),
            max_tools: scale(self.max_tools).max(MIN_TOOL_COUNT.min(self.max_tools)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_one_is_identity() {
        let limits = RequestLimits::default();
        assert_eq!(limits.scaled(1.0), limits);
    }

    #[test]
    fn scales_every_bound() {
        let limits = RequestLimits::default().scaled(0.7);
        assert_eq!(limits.max_history_messages, 70);
        assert_eq!(limits.max_tool_result_chars, 35_000);
        assert_eq!(limits.max_system_prompt_chars, 70_000);
        assert_eq!(limits.max_tools, 44);
    }

    #[test]
    fn compounding_factor() {
        let factor = 0.7 * 0.7;
        let limits = RequestLimits::default().scaled(factor);
        assert_eq!(limits.max_history_messages, 48);
    }

    #[test]
    fn tool_count_floor() {
        let limits = RequestLimits {
            max_tools: 10,
            ..RequestLimits::default()
        }
        .scaled(0.1);
        assert_eq!(limits.max_tools, 3);
    }

    #[test]
    fn small_tool_count_not_raised() {
        let limits = RequestLimits {
            max_tools: 2,
            ..RequestLimits::default()
        }
        .scaled(0.5);
        assert_eq!(limits.max_tools, 2);
    }

    #[test]
    fn bounds_never_zero() {
        let limits = RequestLimits::default().scaled(1e-9);
        assert_eq!(limits.max_history_messages, 1);
        assert_eq!(limits.max_tool_result_chars, 1);
    }
}
