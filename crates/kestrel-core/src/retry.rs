//! Retry configuration and backoff calculation.
//!
//! Portable, sync-only building blocks. The retry decision table and the
//! async attempt loop live in `kestrel-llm`.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum retries (so at most four attempts in total).
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Base delay for the 403 authorization-race backoff.
pub const DEFAULT_AUTH_RACE_BASE_DELAY_MS: u64 = 500;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Multiplier applied to the reduction factor after each size-triggered retry.
pub const DEFAULT_REDUCTION_STEP: f64 = 0.7;

/// Configuration for retry logic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Maximum number of retries shared by every retryable failure kind.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for rate-limit, server-error and timeout backoff in ms.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Base delay for 403 backoff in ms.
    #[serde(default = "default_auth_race_base_delay_ms")]
    pub auth_race_base_delay_ms: u64,
    /// Maximum delay between retries in ms.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Reduction-factor multiplier applied on each `reduce` retry.
    #[serde(default = "default_reduction_step")]
    pub reduction_step: f64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_auth_race_base_delay_ms() -> u64 {
    DEFAULT_AUTH_RACE_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_reduction_step() -> f64 {
    DEFAULT_REDUCTION_STEP
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            auth_race_base_delay_ms: DEFAULT_AUTH_RACE_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            reduction_step: DEFAULT_REDUCTION_STEP,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential backoff without jitter.
///
/// Formula: `min(base_delay * 2^attempt, max_delay)`.
///
/// # Arguments
///
/// * `attempt`: zero-based attempt index (0 for the first retry)
/// * `base_delay_ms`: base delay in milliseconds
/// * `max_delay_ms`: maximum delay cap
#[must_use]
pub fn exponential_backoff(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    // Shifts past 63 would overflow; anything that large is capped anyway.
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    base_delay_ms.saturating_mul(factor).min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
