//! # kestrel-settings
//!
//! Configuration for the Kestrel stream decoder, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`KestrelSettings::default()`]
//! 2. **User file**: `~/.kestrel/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `KESTREL_*` overrides (highest priority)
//!
//! Settings are plain values: callers load them once and inject the parts
//! they need (retry, timeouts, limits) into the components that use them.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
