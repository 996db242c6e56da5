//! Typed outcomes at the pipeline's stage boundaries.
//!
//! Extractors report [`ExtractionError`]; the pipeline and generation
//! client report [`GenerationError`], which is also the result contract
//! returned to transports. Low-level I/O and HTTP errors are converted into
//! one of these before they cross a stage boundary.

use thiserror::Error;

/// Failure to turn an uploaded file into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported attachment category for '{0}'")]
    UnsupportedCategory(String),
    #[error("attachment is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("tabular extraction failed: {0}")]
    Tabular(String),
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("OCR is not available")]
    OcrUnavailable,
    #[error("document conversion is not available")]
    ConversionUnavailable,
    #[error("document conversion failed: {0}")]
    Conversion(String),
    #[error("no usable text could be extracted")]
    NoText,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    /// Whether this failure means "we cannot handle this kind of file" rather
    /// than "this particular file is broken".
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            ExtractionError::UnsupportedCategory(_)
                | ExtractionError::ConversionUnavailable
                | ExtractionError::OcrUnavailable
        )
    }
}

/// Result contract of the question-answering pipeline.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The attachment's category is unknown or cannot be processed here.
    #[error("unsupported attachment: {0}")]
    UnsupportedAttachment(String),
    /// The attachment was recognised but extraction failed.
    #[error("extraction failed: {0}")]
    ExtractionFailure(#[source] ExtractionError),
    /// The attachment produced no passages and the policy is to refuse.
    #[error("attachment '{0}' contains no usable text")]
    NoUsableContent(String),
    /// Embedding or indexing the attachment failed.
    #[error("retrieval failed: {0}")]
    RetrievalFailure(String),
    /// The inference backend could not be reached or answered with an error.
    #[error("inference backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl GenerationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::UnsupportedAttachment(_) => "unsupported_attachment",
            GenerationError::ExtractionFailure(_) => "extraction_failure",
            GenerationError::NoUsableContent(_) => "no_usable_content",
            GenerationError::RetrievalFailure(_) => "retrieval_failure",
            GenerationError::BackendUnavailable(_) => "backend_unavailable",
        }
    }

    /// The user-visible failure string returned in place of an answer.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::UnsupportedAttachment(name) => {
                format!("Unsupported file type: {}", name)
            }
            GenerationError::ExtractionFailure(e) => {
                format!("Could not read the attached file: {}", e)
            }
            GenerationError::NoUsableContent(name) => {
                format!("The attached file '{}' contains no usable text.", name)
            }
            GenerationError::RetrievalFailure(e) => {
                format!("Could not search the attached file: {}", e)
            }
            GenerationError::BackendUnavailable(_) => {
                "Failed to communicate with the language model. Please try again later."
                    .to_string()
            }
        }
    }
}

impl From<ExtractionError> for GenerationError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::UnsupportedCategory(name) => {
                GenerationError::UnsupportedAttachment(name)
            }
            ExtractionError::ConversionUnavailable => GenerationError::UnsupportedAttachment(
                "no converter available for this document".to_string(),
            ),
            ExtractionError::OcrUnavailable => GenerationError::UnsupportedAttachment(
                "OCR is not available for this file".to_string(),
            ),
            other => GenerationError::ExtractionFailure(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_category_maps_to_unsupported_attachment() {
        let g: GenerationError = ExtractionError::UnsupportedCategory("a.exe".into()).into();
        assert_eq!(g.code(), "unsupported_attachment");
        assert!(g.user_message().contains("a.exe"));
    }

    #[test]
    fn missing_converter_is_unsupported() {
        assert!(ExtractionError::ConversionUnavailable.is_unsupported());
        let g: GenerationError = ExtractionError::ConversionUnavailable.into();
        assert!(matches!(g, GenerationError::UnsupportedAttachment(_)));
    }

    #[test]
    fn other_extraction_errors_are_failures() {
        let g: GenerationError = ExtractionError::Pdf("bad xref".into()).into();
        assert_eq!(g.code(), "extraction_failure");
        assert!(g.user_message().contains("bad xref"));
    }

    #[test]
    fn backend_message_hides_transport_detail() {
        let g = GenerationError::BackendUnavailable("connection refused (os error 111)".into());
        assert!(!g.user_message().contains("os error"));
    }
}
