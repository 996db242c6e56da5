//! Sentence-level text chunker.
//!
//! Splits extracted document text into an ordered sequence of
//! [`Passage`]s, one per sentence. Segmentation follows Unicode UAX #29
//! sentence boundaries, so line and paragraph breaks also end a passage
//! (which keeps tabular rows apart). The rules are linguistic heuristics:
//! abbreviations such as `"Dr. Smith"` are split, and that is accepted.
//!
//! # Guarantees
//!
//! - Empty or whitespace-only input yields no passages.
//! - Non-empty input yields at least one passage.
//! - Ordinals are contiguous: `0, 1, 2, …, N-1`.
//! - Every passage is a trimmed substring of the input, in input order.
//! - If segmentation fails, the whole trimmed input becomes one passage and
//!   [`Chunked::degraded`] is set.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::chunk_text;
//!
//! let chunked = chunk_text("The sky is blue. Grass is green.");
//! assert_eq!(chunked.passages.len(), 2);
//! assert_eq!(chunked.passages[0].text, "The sky is blue.");
//! assert!(!chunked.degraded);
//! ```

use thiserror::Error;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

use crate::models::Passage;

/// Why a segmenter could not split its input.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("segments do not cover the input ({covered} of {total} bytes)")]
    Coverage { covered: usize, total: usize },
    #[error("segmenter produced no sentences for non-empty input")]
    NoSentences,
    #[error("{0}")]
    Other(String),
}

/// Splits text into sentence spans.
///
/// Returned spans must be contiguous, in order, and together cover the whole
/// input (whitespace included).
pub trait SentenceSegmenter: Send + Sync {
    fn segment<'a>(&self, text: &'a str) -> Result<Vec<&'a str>, SegmentError>;
}

/// UAX #29 sentence boundaries via `unicode-segmentation`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnicodeSentences;

impl SentenceSegmenter for UnicodeSentences {
    fn segment<'a>(&self, text: &'a str) -> Result<Vec<&'a str>, SegmentError> {
        Ok(text.split_sentence_bounds().collect())
    }
}

/// Result of chunking one document.
#[derive(Debug, Clone, Default)]
pub struct Chunked {
    pub passages: Vec<Passage>,
    /// Set when segmentation failed and the input became a single passage.
    pub degraded: bool,
}

/// Sentence chunker over a pluggable [`SentenceSegmenter`].
pub struct Chunker {
    segmenter: Box<dyn SentenceSegmenter>,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker {
    /// Chunker using Unicode sentence boundaries.
    pub fn new() -> Self {
        Self::with_segmenter(Box::new(UnicodeSentences))
    }

    pub fn with_segmenter(segmenter: Box<dyn SentenceSegmenter>) -> Self {
        Self { segmenter }
    }

    /// Split `text` into passages.
    pub fn chunk(&self, text: &str) -> Chunked {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Chunked::default();
        }

        match self.segment_checked(text) {
            Ok(sentences) => {
                let passages = sentences
                    .into_iter()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .enumerate()
                    .map(|(ordinal, s)| Passage {
                        ordinal,
                        text: s.to_string(),
                    })
                    .collect();
                Chunked {
                    passages,
                    degraded: false,
                }
            }
            Err(e) => {
                warn!(error = %e, chars = trimmed.chars().count(), "sentence segmentation failed; using whole text as one passage");
                Chunked {
                    passages: vec![Passage {
                        ordinal: 0,
                        text: trimmed.to_string(),
                    }],
                    degraded: true,
                }
            }
        }
    }

    /// Run the segmenter and verify its output tiles the input.
    fn segment_checked<'a>(&self, text: &'a str) -> Result<Vec<&'a str>, SegmentError> {
        let sentences = self.segmenter.segment(text)?;

        let covered: usize = sentences.iter().map(|s| s.len()).sum();
        if covered != text.len() {
            return Err(SegmentError::Coverage {
                covered,
                total: text.len(),
            });
        }
        if sentences.iter().all(|s| s.trim().is_empty()) {
            return Err(SegmentError::NoSentences);
        }
        Ok(sentences)
    }
}

/// Chunk `text` with the default Unicode segmenter.
pub fn chunk_text(text: &str) -> Chunked {
    Chunker::new().chunk(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl SentenceSegmenter for Failing {
        fn segment<'a>(&self, _text: &'a str) -> Result<Vec<&'a str>, SegmentError> {
            Err(SegmentError::Other("unsupported script".to_string()))
        }
    }

    /// Drops the last segment, so coverage is incomplete.
    struct Lossy;

    impl SentenceSegmenter for Lossy {
        fn segment<'a>(&self, text: &'a str) -> Result<Vec<&'a str>, SegmentError> {
            let mut parts: Vec<&str> = text.split_sentence_bounds().collect();
            parts.pop();
            Ok(parts)
        }
    }

    #[test]
    fn two_sentences_become_two_passages() {
        let chunked = chunk_text("The sky is blue. Grass is green.");
        let texts: Vec<&str> = chunked.passages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["The sky is blue.", "Grass is green."]);
        assert_eq!(chunked.passages[1].ordinal, 1);
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        assert!(chunk_text("").passages.is_empty());
        assert!(chunk_text("  \n\t \r\n ").passages.is_empty());
        assert!(!chunk_text("   ").degraded);
    }

    #[test]
    fn text_without_terminator_is_one_passage() {
        let chunked = chunk_text("no punctuation at all");
        assert_eq!(chunked.passages.len(), 1);
        assert_eq!(chunked.passages[0].text, "no punctuation at all");
    }

    #[test]
    fn line_breaks_separate_rows() {
        let chunked = chunk_text("name | age\nAda | 36\nAlan | 41\n");
        assert_eq!(chunked.passages.len(), 3);
        assert_eq!(chunked.passages[2].text, "Alan | 41");
    }

    #[test]
    fn decimal_numbers_stay_in_one_sentence() {
        let chunked = chunk_text("Pi is roughly 3.14 in value. It is irrational.");
        assert_eq!(chunked.passages.len(), 2);
        assert!(chunked.passages[0].text.contains("3.14"));
    }

    #[test]
    fn ordinals_are_contiguous() {
        let text = (0..40)
            .map(|i| format!("Sentence number {}.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunked = chunk_text(&text);
        assert_eq!(chunked.passages.len(), 40);
        for (i, p) in chunked.passages.iter().enumerate() {
            assert_eq!(p.ordinal, i);
        }
    }

    #[test]
    fn passages_contain_only_input_text() {
        let text = "Übersicht: Größe 3m. ┌──┐ box!  Next line?\n\nDone";
        let chunked = chunk_text(text);
        assert!(!chunked.passages.is_empty());
        let mut cursor = 0;
        for p in &chunked.passages {
            let found = text[cursor..].find(&p.text).expect("passage not in input");
            cursor += found + p.text.len();
        }
    }

    #[test]
    fn failing_segmenter_degrades_to_single_passage() {
        let chunker = Chunker::with_segmenter(Box::new(Failing));
        let chunked = chunker.chunk("  Some text. More text.  ");
        assert!(chunked.degraded);
        assert_eq!(chunked.passages.len(), 1);
        assert_eq!(chunked.passages[0].text, "Some text. More text.");
        assert_eq!(chunked.passages[0].ordinal, 0);
    }

    #[test]
    fn incomplete_coverage_is_treated_as_failure() {
        let chunker = Chunker::with_segmenter(Box::new(Lossy));
        let chunked = chunker.chunk("First. Second.");
        assert!(chunked.degraded);
        assert_eq!(chunked.passages.len(), 1);
    }

    #[test]
    fn failing_segmenter_on_empty_input_still_returns_nothing() {
        let chunker = Chunker::with_segmenter(Box::new(Failing));
        let chunked = chunker.chunk("   ");
        assert!(chunked.passages.is_empty());
        assert!(!chunked.degraded);
    }
}
