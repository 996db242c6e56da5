//! Attachment categories derived from filename extensions.
//!
//! Category mapping is a pure, total function of the extension
//! (case-insensitive). Anything outside the recognized set maps to
//! [`Category::Unsupported`].
//!
//! | Extensions | Category |
//! |------------|----------|
//! | `.jpg .jpeg .png .gif .bmp` | [`Category::Image`] |
//! | `.pdf` | [`Category::Pdf`] |
//! | `.csv .xlsx` | [`Category::Tabular`] |
//! | `.pptx` | [`Category::Slides`] |
//! | `.docx` | [`Category::WordDoc`] |
//! | `.txt .md` | [`Category::PlainText`] |

use serde::Serialize;
use std::fmt;

/// The closed set of attachment categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Image,
    Pdf,
    Tabular,
    Slides,
    WordDoc,
    PlainText,
    Unsupported,
}

impl Category {
    /// Resolve the category of a file from its name.
    ///
    /// ```rust
    /// use docqa_core::category::Category;
    ///
    /// assert_eq!(Category::from_filename("report.PDF"), Category::Pdf);
    /// assert_eq!(Category::from_filename("notes.md"), Category::PlainText);
    /// assert_eq!(Category::from_filename("data.bin"), Category::Unsupported);
    /// ```
    pub fn from_filename(filename: &str) -> Self {
        match extension(filename) {
            Some(ext) => Self::from_extension(&ext),
            None => Category::Unsupported,
        }
    }

    /// Resolve a category from a bare extension (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "bmp" => Category::Image,
            "pdf" => Category::Pdf,
            "csv" | "xlsx" => Category::Tabular,
            "pptx" => Category::Slides,
            "docx" => Category::WordDoc,
            "txt" | "md" => Category::PlainText,
            _ => Category::Unsupported,
        }
    }

    /// Label used in prompts and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Image => "image",
            Category::Pdf => "pdf",
            Category::Tabular => "tabular",
            Category::Slides => "slides",
            Category::WordDoc => "document",
            Category::PlainText => "text",
            Category::Unsupported => "unknown",
        }
    }

    /// Whether text from this category goes through chunking and retrieval.
    ///
    /// Images bypass retrieval: their OCR output is inlined directly.
    pub fn is_retrievable(&self) -> bool {
        matches!(
            self,
            Category::Pdf
                | Category::Tabular
                | Category::Slides
                | Category::WordDoc
                | Category::PlainText
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension of `filename`, if it has one.
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn extension(filename: &str) -> Option<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
