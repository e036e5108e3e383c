//! # Frame Scanner
//!
//! Extracts brace-balanced JSON fragments from a chunk buffer that the
//! transport has interleaved with binary event-stream framing.
//!
//! Framing can inject stray `{` bytes, so scanning never brace-matches from
//! the first `{`. It first looks for one of [`FRAGMENT_ANCHORS`] and only
//! balances braces from there. Bytes before an anchor are discarded for good.
//! A fragment whose closing brace has not arrived yet is kept verbatim, from
//! its anchor onward, for the next push.

use bytes::BytesMut;
use kestrel_core::text::floor_char_boundary;
use tracing::debug;

/// Key prefixes a payload fragment may start with.
pub const FRAGMENT_ANCHORS: &[&str] = &[
    r#"{"content":"#,
    r#"{"name":"#,
    r#"{"input":"#,
    r#"{"stop":"#,
    r#"{"contextUsagePercentage":"#,
    r#"{"followupPrompt":"#,
    r#"{"usage":"#,
    r#"{"toolUseId":"#,
];

/// Bytes retained when the buffer holds no anchor, so an anchor split across
/// two chunks is still found.
fn anchor_holdback() -> usize {
    FRAGMENT_ANCHORS
        .iter()
        .map(|anchor| anchor.len())
        .max()
        .unwrap_or(1)
        - 1
}

/// Whether `text` begins with one of the [`FRAGMENT_ANCHORS`].
pub fn starts_with_anchor(text: &str) -> bool {
    FRAGMENT_ANCHORS
        .iter()
        .any(|anchor| text.starts_with(anchor))
}

/// Earliest anchor offset in `text` at or after `from`.
pub fn find_anchor(text: &str, from: usize) -> Option<usize> {
    let tail = text.get(from..)?;
    tail.match_indices('{')
        .map(|(offset, _)| offset)
        .find(|&offset| starts_with_anchor(&tail[offset..]))
        .map(|offset| from + offset)
}

/// Index of the `}` closing the object that opens at `open`.
///
/// Tracks string and escape state so braces inside quoted strings are
/// ignored. Returns `None` when `text[open]` is not `{` or the object is not
/// closed within `text`.
pub fn find_balanced_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[open..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Result of one scan step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStep {
    /// A complete fragment spans `start..end`; scanning resumes at `end`.
    Fragment {
        /// Offset of the anchor.
        start: usize,
        /// Offset one past the closing brace.
        end: usize,
    },
    /// No complete fragment remains; everything before `keep_from` can be
    /// dropped.
    NeedMore {
        /// First offset that must be preserved.
        keep_from: usize,
    },
}

/// Scan `buffer` from `cursor` for the next anchored fragment.
pub fn scan(buffer: &str, cursor: usize) -> ScanStep {
    let Some(start) = find_anchor(buffer, cursor) else {
        let keep_from = buffer.len().saturating_sub(anchor_holdback()).max(cursor);
        return ScanStep::NeedMore {
            keep_from: floor_char_boundary(buffer, keep_from).max(cursor),
        };
    };
    match find_balanced_end(buffer, start) {
        Some(close) => ScanStep::Fragment {
            start,
            end: close + 1,
        },
        None => ScanStep::NeedMore { keep_from: start },
    }
}

/// Buffering wrapper around [`scan`].
#[derive(Debug, Default)]
pub struct FrameScanner {
    buffer: String,
}

impl FrameScanner {
    /// Create an empty scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and drain every complete fragment.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let mut fragments = Vec::new();
        let mut cursor = 0;
        loop {
            match scan(&self.buffer, cursor) {
                ScanStep::Fragment { start, end } => {
                    if start > cursor {
                        debug!(skipped = start - cursor, "discarded framing bytes");
                    }
                    fragments.push(self.buffer[start..end].to_owned());
                    cursor = end;
                }
                ScanStep::NeedMore { keep_from } => {
                    let _ = self.buffer.drain(..keep_from);
                    break;
                }
            }
        }
        fragments
    }

    /// Unconsumed suffix awaiting more input.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }
}

/// Streaming UTF-8 decoder for raw transport chunks.
///
/// An incomplete multi-byte sequence at the end of a chunk is held until the
/// next chunk completes it. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: BytesMut,
}

impl Utf8ChunkDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` together with any held-back bytes.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&rest[..valid_up_to]) {
                        out.push_str(valid);
                    }
                    match err.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid_up_to + invalid;
                        }
                        None => {
                            consumed += valid_up_to;
                            break;
                        }
                    }
                }
            }
        }
        let _ = self.pending.split_to(consumed);
        out
    }

    /// Flush any held-back bytes lossily.
    pub fn finish(&mut self) -> String {
        let tail = self.pending.split();
        String::from_utf8_lossy(&tail).into_owned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ── find_balanced_end ───────────────────────────────────────────

    #[test]
    fn balanced_simple() {
        assert_eq!(find_balanced_end(r#"{"a":1}"#, 0), Some(6));
    }

    #[test]
    fn balanced_nested() {
        let text = r#"x{"a":{"b":{}}}y"#;
        assert_eq!(find_balanced_end(text, 1), Some(14));
    }

    #[test]
    fn balanced_ignores_braces_in_strings() {
        let text = r#"{"a":"}{\"}"}"#;
        assert_eq!(find_balanced_end(text, 0), Some(text.len() - 1));
    }

    #[test]
    fn balanced_escaped_backslash_before_quote() {
        let text = r#"{"a":"\\"}"#;
        assert_eq!(find_balanced_end(text, 0), Some(text.len() - 1));
    }

    #[test]
    fn balanced_unclosed() {
        assert_eq!(find_balanced_end(r#"{"a":{"b":1}"#, 0), None);
    }

    #[test]
    fn balanced_requires_open_brace() {
        assert_eq!(find_balanced_end("abc", 0), None);
        assert_eq!(find_balanced_end("{}", 5), None);
    }

    // ── scan ────────────────────────────────────────────────────────

    #[test]
    fn single_fragment_has_empty_remainder() {
        let mut scanner = FrameScanner::new();
        let fragments = scanner.push(r#"{"content":"hi"}"#);
        assert_eq!(fragments, vec![r#"{"content":"hi"}"#]);
        assert_eq!(scanner.remainder(), "");
    }

    #[test]
    fn stray_brace_before_anchor_ignored() {
        let mut scanner = FrameScanner::new();
        let fragments = scanner.push("\u{0}\u{0}{:event-type{\u{7}{\"content\":\"hi\"}\u{3}");
        assert_eq!(fragments, vec![r#"{"content":"hi"}"#]);
    }

    #[test]
    fn truncated_fragment_preserved_across_pushes() {
        let mut scanner = FrameScanner::new();
        assert!(scanner.push("noise{\"content\":\"hel").is_empty());
        assert_eq!(scanner.remainder(), "{\"content\":\"hel");
        let fragments = scanner.push("lo\"}");
        assert_eq!(fragments, vec![r#"{"content":"hello"}"#]);
        assert_eq!(scanner.remainder(), "");
    }

    #[test]
    fn anchor_split_across_chunks() {
        let mut scanner = FrameScanner::new();
        assert!(scanner.push("garbage garbage {\"cont").is_empty());
        let fragments = scanner.push("ent\":\"x\"}");
        assert_eq!(fragments, vec![r#"{"content":"x"}"#]);
    }

    #[test]
    fn garbage_between_fragments_dropped() {
        let mut scanner = FrameScanner::new();
        let fragments =
            scanner.push("{\"content\":\"a\"}\u{1}\u{2}}{junk{\"stop\":true}\u{9}");
        assert_eq!(fragments, vec![r#"{"content":"a"}"#, r#"{"stop":true}"#]);
    }

    #[test]
    fn unanchored_object_never_surfaces() {
        let mut scanner = FrameScanner::new();
        let fragments = scanner.push(r#"{"timestamp":123,"content":"hello"}"#);
        assert!(fragments.is_empty());
    }

    #[test]
    fn scan_reports_need_more_at_anchor() {
        let text = "xx{\"name\":\"bash\"";
        assert_eq!(scan(text, 0), ScanStep::NeedMore { keep_from: 2 });
    }

    // ── Utf8ChunkDecoder ────────────────────────────────────────────

    #[test]
    fn decoder_holds_split_multibyte() {
        let bytes = "héllo".as_bytes();
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&bytes[..2]), "h");
        assert_eq!(decoder.decode(&bytes[2..]), "éllo");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn decoder_finish_flushes_truncated_tail() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xE2, 0x80]), "a");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    proptest! {
        #[test]
        fn garbage_never_leaks_into_fragments(
            noise in "[^\"\\\\]{0,24}",
            payload in "[a-z ]{0,16}",
            split in 0usize..64,
        ) {
            let fragment = format!(r#"{{"content":"{payload}"}}"#);
            let input = format!("{noise}{fragment}{noise}{fragment}");
            let split = floor_char_boundary(&input, split.min(input.len()));

            let mut scanner = FrameScanner::new();
            let mut out = scanner.push(&input[..split]);
            out.extend(scanner.push(&input[split..]));

            prop_assert!(out.len() >= 2);
            for item in out.iter().rev().take(2) {
                prop_assert_eq!(item, &fragment);
            }
        }
    }
}
