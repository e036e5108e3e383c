//! Token counting.
//!
//! The estimator works in quarter-token units: ordinary ASCII costs one unit,
//! ASCII punctuation two, CJK ideographs and kana a full token each, and any
//! other non-ASCII character two units.

use std::sync::{Arc, LazyLock};

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> u64;
}

/// Units per token.
const UNITS_PER_TOKEN: u64 = 4;

/// Character-class token estimator.
#[derive(Clone, Debug)]
pub struct EstimatingCounter {
    ascii_units: [u8; 128],
}

impl EstimatingCounter {
    /// Build the ASCII cost table.
    #[must_use]
    pub fn new() -> Self {
        let mut ascii_units = [1u8; 128];
        for (byte, units) in ascii_units.iter_mut().enumerate() {
            let ch = byte as u8 as char;
            if ch.is_ascii_punctuation() {
                *units = 2;
            }
        }
        Self { ascii_units }
    }

    fn units(&self, ch: char) -> u64 {
        if ch.is_ascii() {
            return u64::from(self.ascii_units[ch as usize]);
        }
        if is_wide_script(ch) {
            UNITS_PER_TOKEN
        } else {
            2
        }
    }
}

impl Default for EstimatingCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for EstimatingCounter {
    fn count(&self, text: &str) -> u64 {
        let units: u64 = text.chars().map(|ch| self.units(ch)).sum();
        units.div_ceil(UNITS_PER_TOKEN)
    }
}

/// CJK ideographs, kana and hangul: roughly one token per character.
fn is_wide_script(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xAC00..=0xD7AF | 0xF900..=0xFAFF
    )
}

static SHARED: LazyLock<Arc<EstimatingCounter>> =
    LazyLock::new(|| Arc::new(EstimatingCounter::new()));

/// Process-wide estimator. The table is built on first call and only read
/// afterwards.
pub fn shared_counter() -> Arc<dyn TokenCounter> {
    SHARED.clone()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
