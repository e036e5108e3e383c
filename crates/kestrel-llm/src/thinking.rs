//! # Thinking Segmenter
//!
//! Splits streamed answer text into thinking and answer segments.
//!
//! Several tag vocabularies are searched in parallel; the earliest open tag
//! wins and binds its paired close tag. After the close tag the segmenter is
//! latched in [`Phase::Extracted`]: a second thinking block is never opened
//! within one response, and any later tag text is answer text.
//!
//! Chunks arrive at arbitrary boundaries, so a suffix that could be the start
//! of a tag is held back until the next push or [`ThinkingSegmenter::finish`].

use kestrel_core::text::floor_char_boundary;

/// An open/close tag pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagPair {
    /// Opening tag.
    pub open: &'static str,
    /// Closing tag.
    pub close: &'static str,
}

/// Recognized thinking vocabularies.
pub const THINKING_TAGS: &[TagPair] = &[
    TagPair {
        open: "<thinking>",
        close: "</thinking>",
    },
    TagPair {
        open: "<think>",
        close: "</think>",
    },
    TagPair {
        open: "<reasoning>",
        close: "</reasoning>",
    },
    TagPair {
        open: "<thought>",
        close: "</thought>",
    },
];

/// Separator consumed right after a close tag.
const SEPARATOR: &str = "\n\n";

/// Output of the segmenter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Answer text.
    Text(String),
    /// Thinking text.
    Thinking(String),
    /// The thinking block is complete.
    ThinkingEnd,
}

/// Segmenter phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No open tag seen yet.
    BeforeThinking,
    /// Inside a thinking block, waiting for `close`.
    InsideThinking {
        /// Bound close tag.
        close: &'static str,
    },
    /// Thinking block done; everything else is answer text.
    Extracted,
}

/// Stateful thinking/answer splitter for one response.
#[derive(Clone, Debug)]
pub struct ThinkingSegmenter {
    tags: &'static [TagPair],
    phase: Phase,
    pending: String,
    awaiting_separator: bool,
    open_holdback: usize,
    close_holdback: usize,
}

impl Default for ThinkingSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl ThinkingSegmenter {
    /// Segmenter over [`THINKING_TAGS`].
    pub fn new() -> Self {
        Self::with_tags(THINKING_TAGS)
    }

    /// Segmenter over a custom vocabulary.
    pub fn with_tags(tags: &'static [TagPair]) -> Self {
        let longest = |f: fn(&TagPair) -> usize| tags.iter().map(f).max().unwrap_or(1);
        Self {
            tags,
            phase: Phase::BeforeThinking,
            pending: String::new(),
            awaiting_separator: false,
            open_holdback: longest(|t| t.open.len()).saturating_sub(1),
            close_holdback: longest(|t| t.close.len()).saturating_sub(1),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Feed one chunk of answer text.
    pub fn push(&mut self, chunk: &str) -> Vec<Segment> {
        self.pending.push_str(chunk);
        let mut out = Vec::new();

        loop {
            match self.phase {
                Phase::BeforeThinking => {
                    if let Some((pos, pair)) = self.earliest_open() {
                        if pos > 0 {
                            out.push(Segment::Text(self.pending[..pos].to_owned()));
                        }
                        let _ = self.pending.drain(..pos + pair.open.len());
                        self.phase = Phase::InsideThinking { close: pair.close };
                        continue;
                    }
                    if let Some(text) = self.take_all_but(self.open_holdback) {
                        out.push(Segment::Text(text));
                    }
                    break;
                }
                Phase::InsideThinking { close } => {
                    if let Some(pos) = self.pending.find(close) {
                        if pos > 0 {
                            out.push(Segment::Thinking(self.pending[..pos].to_owned()));
                        }
                        let _ = self.pending.drain(..pos + close.len());
                        out.push(Segment::ThinkingEnd);
                        self.phase = Phase::Extracted;
                        self.awaiting_separator = true;
                        continue;
                    }
                    if let Some(text) = self.take_all_but(self.close_holdback) {
                        out.push(Segment::Thinking(text));
                    }
                    break;
                }
                Phase::Extracted => {
                    if self.awaiting_separator {
                        if self.pending.starts_with(SEPARATOR) {
                            let _ = self.pending.drain(..SEPARATOR.len());
                            self.awaiting_separator = false;
                        } else if SEPARATOR.starts_with(self.pending.as_str()) {
                            // Possibly the first half of the separator.
                            break;
                        } else {
                            self.awaiting_separator = false;
                        }
                    }
                    if !self.pending.is_empty() {
                        out.push(Segment::Text(std::mem::take(&mut self.pending)));
                    }
                    break;
                }
            }
        }
        out
    }

    /// Flush held-back text at end of input.
    ///
    /// An unterminated thinking block is closed, so truncated responses
    /// still yield their reasoning.
    pub fn finish(&mut self) -> Vec<Segment> {
        let rest = std::mem::take(&mut self.pending);
        self.awaiting_separator = false;
        match self.phase {
            Phase::InsideThinking { .. } => {
                self.phase = Phase::Extracted;
                let mut out = Vec::with_capacity(2);
                if !rest.is_empty() {
                    out.push(Segment::Thinking(rest));
                }
                out.push(Segment::ThinkingEnd);
                out
            }
            Phase::BeforeThinking | Phase::Extracted => {
                if rest.is_empty() {
                    Vec::new()
                } else {
                    vec![Segment::Text(rest)]
                }
            }
        }
    }

    /// Earliest open tag in the pending buffer; longer tags win ties.
    fn earliest_open(&self) -> Option<(usize, TagPair)> {
        self.tags
            .iter()
            .filter_map(|pair| self.pending.find(pair.open).map(|pos| (pos, *pair)))
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.open.len().cmp(&a.1.open.len())))
    }

    /// Remove and return everything except the last `keep` bytes.
    fn take_all_but(&mut self, keep: usize) -> Option<String> {
        let split = floor_char_boundary(&self.pending, self.pending.len().saturating_sub(keep));
        if split == 0 {
            return None;
        }
        Some(self.pending.drain(..split).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chunks: &[&str]) -> Vec<Segment> {
        let mut segmenter = ThinkingSegmenter::new();
        let mut out: Vec<Segment> = chunks.iter().flat_map(|c| segmenter.push(c)).collect();
        out.extend(segmenter.finish());
        out
    }

    fn joined(segments: &[Segment]) -> (String, String) {
        let mut text = String::new();
        let mut thinking = String::new();
        for segment in segments {
            match segment {
                Segment::Text(t) => text.push_str(t),
                Segment::Thinking(t) => thinking.push_str(t),
                Segment::ThinkingEnd => {}
            }
        }
        (text, thinking)
    }

    #[test]
    fn thinking_then_answer_consumes_separator() {
        let out = run(&["<thinking>Let me think</thinking>\n\nAnswer"]);
        assert_eq!(
            out,
            vec![
                Segment::Thinking("Let me think".into()),
                Segment::ThinkingEnd,
                Segment::Text("Answer".into()),
            ]
        );
    }

    #[test]
    fn open_tag_split_across_chunks() {
        let out = run(&["<thin", "king>x</thinking>"]);
        assert_eq!(out, vec![Segment::Thinking("x".into()), Segment::ThinkingEnd]);
    }

    #[test]
    fn close_tag_split_across_chunks() {
        let out = run(&["<think>abc</th", "ink>done"]);
        let (text, thinking) = joined(&out);
        assert_eq!(thinking, "abc");
        assert_eq!(text, "done");
    }

    #[test]
    fn separator_split_across_chunks() {
        let out = run(&["<think>a</think>\n", "\nB"]);
        let (text, _) = joined(&out);
        assert_eq!(text, "B");
    }

    #[test]
    fn single_newline_after_close_is_kept() {
        let out = run(&["<think>a</think>\nB"]);
        let (text, _) = joined(&out);
        assert_eq!(text, "\nB");
    }

    #[test]
    fn never_reopens() {
        let out = run(&["<think>a</think>\n\nx <thinking>y</thinking>"]);
        let (text, thinking) = joined(&out);
        assert_eq!(thinking, "a");
        assert_eq!(text, "x <thinking>y</thinking>");
        assert_eq!(out.iter().filter(|s| **s == Segment::ThinkingEnd).count(), 1);
    }

    #[test]
    fn text_before_open_tag() {
        let out = run(&["Hello <reasoning>why</reasoning>\n\nthen"]);
        assert_eq!(out[0], Segment::Text("Hello ".into()));
        let (text, thinking) = joined(&out);
        assert_eq!(thinking, "why");
        assert_eq!(text, "Hello then");
    }

    #[test]
    fn earliest_vocabulary_binds_close() {
        let out = run(&["<thought>a</thinking>b</thought>c"]);
        let (text, thinking) = joined(&out);
        assert_eq!(thinking, "a</thinking>b");
        assert_eq!(text, "c");
    }

    #[test]
    fn plain_text_is_held_back_then_flushed() {
        let mut segmenter = ThinkingSegmenter::new();
        assert!(segmenter.push("Hi").is_empty());
        assert_eq!(segmenter.finish(), vec![Segment::Text("Hi".into())]);
    }

    #[test]
    fn long_plain_text_streams_before_finish() {
        let mut segmenter = ThinkingSegmenter::new();
        let out = segmenter.push("The quick brown fox jumps");
        let (text, _) = joined(&out);
        assert!(!text.is_empty());
        let (rest, _) = joined(&segmenter.finish());
        assert_eq!(format!("{text}{rest}"), "The quick brown fox jumps");
    }

    #[test]
    fn unterminated_thinking_closed_at_finish() {
        let out = run(&["<thinking>partial reasoning"]);
        let (text, thinking) = joined(&out);
        assert_eq!(thinking, "partial reasoning");
        assert!(text.is_empty());
        assert_eq!(out.last(), Some(&Segment::ThinkingEnd));
    }

    #[test]
    fn holdback_respects_char_boundaries() {
        let out = run(&["ééééééééééé", "ü<think>x</think>"]);
        let (text, thinking) = joined(&out);
        assert_eq!(text, "éééééééééééü");
        assert_eq!(thinking, "x");
    }

    #[test]
    fn phase_transitions() {
        let mut segmenter = ThinkingSegmenter::new();
        assert_eq!(segmenter.phase(), Phase::BeforeThinking);
        let _ = segmenter.push("<think>");
        assert_eq!(segmenter.phase(), Phase::InsideThinking { close: "</think>" });
        let _ = segmenter.push("</think>");
        assert_eq!(segmenter.phase(), Phase::Extracted);
    }
}
