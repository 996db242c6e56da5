//! Prompt augmentation: folding attachment context into the user's prompt.
//!
//! The inference backend sees one flat prompt string. This module decides
//! what gets appended to the user's question for each kind of attachment
//! context, and enforces character budgets so the backend's context window
//! is respected.

use crate::category::Category;
use crate::models::RankedPassage;

/// Context available for a prompt.
#[derive(Debug, Clone)]
pub enum AttachmentContext<'a> {
    /// No file was attached.
    None,
    /// Ranked passages retrieved from a chunked document.
    Retrieved {
        category: Category,
        passages: &'a [RankedPassage],
    },
    /// OCR text from an image, used directly.
    ImageText(&'a str),
    /// A file was attached but produced no usable text.
    Empty { category: Category },
}

/// Character budgets applied while composing.
#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    /// Maximum characters of joined retrieved passages.
    pub context_chars: usize,
    /// Maximum characters of image OCR text.
    pub image_chars: usize,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            context_chars: 3000,
            image_chars: 500,
        }
    }
}

/// Build the final prompt sent to the inference backend.
///
/// ```rust
/// use docqa_core::prompt::{compose, AttachmentContext, Budgets};
///
/// let p = compose("Hi", &AttachmentContext::None, Budgets::default());
/// assert_eq!(p, "Hi");
/// ```
pub fn compose(prompt: &str, context: &AttachmentContext<'_>, budgets: Budgets) -> String {
    match context {
        AttachmentContext::None => prompt.to_string(),
        AttachmentContext::Retrieved { category, passages } if !passages.is_empty() => {
            let joined = passages
                .iter()
                .map(|p| p.passage.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "{}\n\nAnswer the following prompt based on the provided attachment.\nAttachment Type: {}. Relevant Content:\n{}",
                prompt,
                category,
                truncate_chars(&joined, budgets.context_chars)
            )
        }
        AttachmentContext::Retrieved { category, .. } | AttachmentContext::Empty { category } => {
            format!(
                "{}\n\nNote: the attached {} file contained no usable text, so answer without it.",
                prompt, category
            )
        }
        AttachmentContext::ImageText(text) => {
            let text = text.trim();
            if text.is_empty() {
                return compose(
                    prompt,
                    &AttachmentContext::Empty {
                        category: Category::Image,
                    },
                    budgets,
                );
            }
            format!(
                "{}\n\nAttachment Type: {}. Extracted Text from Image:\n{}",
                prompt,
                Category::Image,
                truncate_chars(text, budgets.image_chars)
            )
        }
    }
}

/// First `max_chars` characters of `text` (by `char`, never splitting one).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Passage;

    fn ranked(texts: &[&str]) -> Vec<RankedPassage> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| RankedPassage {
                passage: Passage {
                    ordinal: i,
                    text: t.to_string(),
                },
                distance: i as f32,
            })
            .collect()
    }

    #[test]
    fn retrieved_context_is_delimited_and_ordered() {
        let passages = ranked(&["The sky is blue.", "Grass is green."]);
        let p = compose(
            "What color is the sky?",
            &AttachmentContext::Retrieved {
                category: Category::PlainText,
                passages: &passages,
            },
            Budgets::default(),
        );
        assert!(p.starts_with("What color is the sky?\n\n"));
        assert!(p.contains("Attachment Type: text. Relevant Content:\nThe sky is blue.\nGrass is green."));
    }

    #[test]
    fn context_is_truncated_to_budget() {
        let long = "x".repeat(100);
        let passages = ranked(&[&long]);
        let p = compose(
            "Q",
            &AttachmentContext::Retrieved {
                category: Category::Pdf,
                passages: &passages,
            },
            Budgets {
                context_chars: 10,
                image_chars: 5,
            },
        );
        assert!(p.ends_with(&format!("Relevant Content:\n{}", "x".repeat(10))));
    }

    #[test]
    fn image_text_is_inlined_and_truncated() {
        let p = compose(
            "Read this",
            &AttachmentContext::ImageText("  STOP sign ahead  "),
            Budgets {
                context_chars: 100,
                image_chars: 4,
            },
        );
        assert_eq!(p, "Read this\n\nAttachment Type: image. Extracted Text from Image:\nSTOP");
    }

    #[test]
    fn empty_context_adds_note() {
        let p = compose(
            "Q",
            &AttachmentContext::Empty {
                category: Category::Pdf,
            },
            Budgets::default(),
        );
        assert!(p.starts_with("Q\n\nNote: the attached pdf file"));

        let no_passages: Vec<RankedPassage> = Vec::new();
        let p2 = compose(
            "Q",
            &AttachmentContext::Retrieved {
                category: Category::Pdf,
                passages: &no_passages,
            },
            Budgets::default(),
        );
        assert_eq!(p, p2);
    }

    #[test]
    fn blank_image_text_counts_as_empty() {
        let p = compose("Q", &AttachmentContext::ImageText("   "), Budgets::default());
        assert!(p.contains("attached image file contained no usable text"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
    }
}
