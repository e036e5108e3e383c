//! # Retry Decision Engine
//!
//! Pure mapping from an attempt failure to a retry strategy.
//!
//! | failure | strategy | delay |
//! |---|---|---|
//! | 413, or 400 with a size phrase | `reduce` | 0 |
//! | 429, 5xx | `backoff` | `min(base * 2^attempt, max)` |
//! | 403 | `backoff` | `min(auth_race_base * 2^attempt, max)` |
//! | first-chunk or idle timeout | `backoff` | as 429 |
//! | anything else | `none` | - |
//!
//! Every kind shares one attempt budget; `attempt >= max_attempts` is always
//! `none`.

use kestrel_core::retry::{RetryConfig, exponential_backoff};
use serde::{Deserialize, Serialize};

/// Phrases in a 400 body that mean the request was too large.
pub const SIZE_LIMIT_PHRASES: &[&str] = &[
    "CONTENT_LENGTH_EXCEEDS_THRESHOLD",
    "Input is too long",
    "Improperly formed",
];

/// How the next attempt differs from the failed one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// Retry immediately with smaller request bounds.
    Reduce,
    /// Retry the same request after a delay.
    Backoff,
    /// Do not retry.
    None,
}

impl RetryStrategy {
    /// Wire string for events and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reduce => "reduce",
            Self::Backoff => "backoff",
            Self::None => "none",
        }
    }
}

/// Outcome of [`decide_retry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether another attempt should be made.
    pub should_retry: bool,
    /// Wait before the next attempt.
    pub delay_ms: u64,
    /// Strategy for the next attempt.
    pub strategy: RetryStrategy,
}

impl RetryDecision {
    /// Give up.
    pub const NONE: Self = Self {
        should_retry: false,
        delay_ms: 0,
        strategy: RetryStrategy::None,
    };

    const fn reduce() -> Self {
        Self {
            should_retry: true,
            delay_ms: 0,
            strategy: RetryStrategy::Reduce,
        }
    }

    const fn backoff(delay_ms: u64) -> Self {
        Self {
            should_retry: true,
            delay_ms,
            strategy: RetryStrategy::Backoff,
        }
    }
}

/// Whether a 400 body describes an oversized request.
pub fn is_size_limit_error(error_text: &str) -> bool {
    SIZE_LIMIT_PHRASES
        .iter()
        .any(|phrase| error_text.contains(phrase))
}

/// Decide how to handle a failed HTTP attempt, using the default delays.
pub fn decide_retry(status: u16, error_text: &str, attempt: u32, max_attempts: u32) -> RetryDecision {
    decide_retry_with(&RetryConfig::default(), status, error_text, attempt, max_attempts)
}

/// Decide how to handle a failed HTTP attempt.
///
/// `attempt` is the zero-based index of the retry about to be made.
pub fn decide_retry_with(
    config: &RetryConfig,
    status: u16,
    error_text: &str,
    attempt: u32,
    max_attempts: u32,
) -> RetryDecision {
    if attempt >= max_attempts {
        return RetryDecision::NONE;
    }
    match status {
        413 => RetryDecision::reduce(),
        400 if is_size_limit_error(error_text) => RetryDecision::reduce(),
        429 | 500..=599 => RetryDecision::backoff(exponential_backoff(
            attempt,
            config.base_delay_ms,
            config.max_delay_ms,
        )),
        403 => RetryDecision::backoff(exponential_backoff(
            attempt,
            config.auth_race_base_delay_ms,
            config.max_delay_ms,
        )),
        _ => RetryDecision::NONE,
    }
}

/// Decide how to handle a first-chunk or idle timeout.
pub fn decide_timeout_retry(config: &RetryConfig, attempt: u32, max_attempts: u32) -> RetryDecision {
    if attempt >= max_attempts {
        return RetryDecision::NONE;
    }
    RetryDecision::backoff(exponential_backoff(
        attempt,
        config.base_delay_ms,
        config.max_delay_ms,
    ))
}

/// Retry bookkeeping for one logical request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryState {
    /// Retries made so far.
    pub attempt: u32,
    /// Multiplier for request-size bounds, in `(0, 1]`.
    pub reduction_factor: f64,
}

impl Default for RetryState {
    fn default() -> Self {
        Self {
            attempt: 0,
            reduction_factor: 1.0,
        }
    }
}

impl RetryState {
    /// Record that `decision` is being acted on.
    pub fn advance(&mut self, decision: &RetryDecision, reduction_step: f64) {
        self.attempt += 1;
        if decision.strategy == RetryStrategy::Reduce {
            self.reduction_factor *= reduction_step;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
