//! Sentence chunking for long-form narration.
//!
//! Models degrade on long inputs, so long text is split into sentences that
//! are generated one by one and concatenated afterwards.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentence-terminal punctuation followed by whitespace.
static SENTENCE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence break regex should be valid"));

/// Default minimum length of a punctuation-only segment worth keeping.
pub const DEFAULT_MIN_CHARS: usize = 3;

/// Splits text into ordered sentence segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    min_chars: usize,
    max_chars: Option<usize>,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self { min_chars: DEFAULT_MIN_CHARS, max_chars: None }
    }
}

impl TextChunker {
    /// Chunker with the default threshold and no length cap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments shorter than `min_chars` with no letters or digits are dropped.
    #[must_use]
    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    /// Split segments longer than `max_chars` at word boundaries.
    #[must_use]
    pub fn with_max_chars(mut self, max_chars: Option<usize>) -> Self {
        self.max_chars = max_chars.filter(|&n| n > 0);
        self
    }

    /// Split `text` into segments, preserving order.
    ///
    /// Newlines become spaces first. The text is cut after every `.`, `!` or
    /// `?` that is followed by whitespace; the punctuation stays with its
    /// sentence.
    pub fn split(&self, text: &str) -> Segments {
        let flattened = text.replace("\r\n", " ").replace(['\n', '\r'], " ");

        let mut pieces = Vec::new();
        let mut start = 0;
        for found in SENTENCE_BREAK_RE.find_iter(&flattened) {
            // The punctuation mark is one ASCII byte.
            pieces.push(&flattened[start..=found.start()]);
            start = found.end();
        }
        pieces.push(&flattened[start..]);

        let mut segments = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let sentence = piece.trim();
            if !self.keeps(sentence) {
                continue;
            }
            match self.max_chars {
                Some(limit) if sentence.chars().count() > limit => {
                    segments.extend(wrap_words(sentence, limit));
                }
                _ => segments.push(sentence.to_string()),
            }
        }

        let total = segments.len();
        Segments { inner: segments.into_iter(), total }
    }

    fn keeps(&self, sentence: &str) -> bool {
        if sentence.is_empty() {
            return false;
        }
        sentence.chars().count() >= self.min_chars || sentence.chars().any(char::is_alphanumeric)
    }
}

/// Split one long sentence at word boundaries so no piece exceeds `limit`
/// characters, unless a single word is longer than `limit`.
fn wrap_words(sentence: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in sentence.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= limit {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            pieces.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Ordered, single-pass sequence of text segments.
#[derive(Debug)]
pub struct Segments {
    inner: std::vec::IntoIter<String>,
    total: usize,
}

impl Segments {
    /// Number of segments produced by the split, consumed or not.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for Segments {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Segments {}

/// Split with the default chunker.
pub fn split_sentences(text: &str) -> Vec<String> {
    TextChunker::default().split(text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_terminal_punctuation() {
        assert_eq!(split_sentences("One. Two! Three?"), vec!["One.", "Two!", "Three?"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n  ").is_empty());
    }

    #[test]
    fn test_stray_punctuation_dropped() {
        assert!(split_sentences(".").is_empty());
        assert_eq!(split_sentences("Hello there. . ! Bye."), vec!["Hello there.", "Bye."]);
    }

    #[test]
    fn test_short_words_are_kept() {
        assert_eq!(split_sentences("No. Go! Ok"), vec!["No.", "Go!", "Ok"]);
    }

    #[test]
    fn test_newlines_collapse() {
        let text = "Once upon a time\nthere was a fox.\r\nIt ran.\rThe end.";
        assert_eq!(
            split_sentences(text),
            vec!["Once upon a time there was a fox.", "It ran.", "The end."]
        );
    }

    #[test]
    fn test_no_split_without_whitespace() {
        assert_eq!(split_sentences("Version 1.5 is out. Yes"), vec!["Version 1.5 is out.", "Yes"]);
        assert_eq!(split_sentences("Wait... what?! Really."), vec!["Wait...", "what?!", "Really."]);
    }

    #[test]
    fn test_max_chars_wraps_long_sentences() {
        let chunker = TextChunker::new().with_max_chars(Some(12));
        let segments: Vec<String> = chunker.split("alpha beta gamma delta. Short.").collect();
        assert_eq!(segments, vec!["alpha beta", "gamma delta.", "Short."]);
    }

    #[test]
    fn test_max_chars_keeps_oversized_word_whole() {
        let chunker = TextChunker::new().with_max_chars(Some(4));
        let segments: Vec<String> = chunker.split("extraordinary day").collect();
        assert_eq!(segments, vec!["extraordinary", "day"]);
    }

    #[test]
    fn test_segments_report_total_and_order() {
        let mut segments = TextChunker::new().split("A one. A two. A three.");
        assert_eq!(segments.total(), 3);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments.next().as_deref(), Some("A one."));
        assert_eq!(segments.total(), 3);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_custom_min_chars() {
        let chunker = TextChunker::new().with_min_chars(1);
        let segments: Vec<String> = chunker.split("Hi. ! There.").collect();
        assert_eq!(segments, vec!["Hi.", "!", "There."]);
    }
}
