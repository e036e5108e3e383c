//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]`. Each type implements
//! [`Default`] with production values, and `#[serde(default)]` lets a partial
//! JSON file override only the fields it names.

mod limits;
mod stream;

pub use limits::*;
pub use stream::*;

use kestrel_core::retry::RetryConfig;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "retry": { "maxRetries": 5 },
///   "timeouts": { "firstChunkTimeoutMs": 45000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KestrelSettings {
    /// Retry budget and backoff parameters.
    pub retry: RetryConfig,
    /// First-chunk and idle deadlines.
    pub timeouts: TimeoutSettings,
    /// Stream decoding settings.
    pub stream: StreamSettings,
    /// Request-size bounds handed to the request builder.
    pub limits: RequestLimits,
}

impl KestrelSettings {
    /// Check cross-field invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        let step = self.retry.reduction_step;
        if !(step > 0.0 && step <= 1.0) {
            return Err(SettingsError::InvalidValue(format!(
                "retry.reductionStep must be in (0, 1], got {step}"
            )));
        }
        if self.timeouts.first_chunk_timeout_ms == 0 || self.timeouts.idle_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "timeouts must be greater than zero".into(),
            ));
        }
        if self.stream.context_window == 0 {
            return Err(SettingsError::InvalidValue(
                "stream.contextWindow must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
