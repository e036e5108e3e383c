//! UTF-8–safe string truncation utilities.
//!
//! Rust `&str[..n]` panics when `n` falls inside a multi-byte character.
//! These helpers find the nearest char boundary so truncation is always safe.

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
///
/// Returns the longest prefix of `s` whose byte length is ≤ `max_bytes`
/// and that does not split a multi-byte character.
#[inline]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    &s[..floor_char_boundary(s, max_bytes)]
}

/// Largest char boundary in `s` that is ≤ `index`.
///
/// `str::floor_char_boundary` is nightly-only, so this walks backward itself.
#[inline]
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut end = index;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_within_limit() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn ascii_truncated() {
        assert_eq!(truncate_str("hello world", 5), "hello");
    }

    #[test]
    fn multibyte_snaps_back() {
        // '—' is 3 bytes
        assert_eq!(truncate_str("ab—cd", 3), "ab");
        assert_eq!(truncate_str("ab—cd", 5), "ab—");
    }

    #[test]
    fn zero_budget() {
        assert_eq!(truncate_str("abc", 0), "");
    }

    #[test]
    fn floor_boundary_past_end() {
        assert_eq!(floor_char_boundary("abc", 10), 3);
        assert_eq!(floor_char_boundary("é", 1), 0);
    }
}
