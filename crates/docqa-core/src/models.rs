//! Core data types shared by the pipeline stages.

use serde::Serialize;

use crate::category::Category;

/// One uploaded artifact.
///
/// Lives for the duration of a single request. `text` is filled in once by
/// extraction and stays `None` if extraction failed.
#[derive(Debug, Clone)]
pub struct Document {
    /// Original filename, used only to derive the category.
    pub filename: String,
    /// Category derived from the filename extension.
    pub category: Category,
    /// Raw uploaded bytes.
    pub bytes: Vec<u8>,
    /// Extracted text, if extraction has run and succeeded.
    pub text: Option<String>,
}

impl Document {
    /// Create a document from an upload, deriving its category from `filename`.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let category = Category::from_filename(&filename);
        Self {
            filename,
            category,
            bytes,
            text: None,
        }
    }
}

/// A retrievable unit of a document's text (one sentence or equivalent span).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Passage {
    /// 0-based position in the document's passage sequence.
    pub ordinal: usize,
    /// Passage text, trimmed.
    pub text: String,
}

/// A passage returned by retrieval together with its distance to the query.
#[derive(Debug, Clone, Serialize)]
pub struct RankedPassage {
    pub passage: Passage,
    /// Squared L2 distance between passage and query vectors.
    pub distance: f32,
}
