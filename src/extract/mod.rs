//! Per-category text extraction.
//!
//! [`ExtractorRegistry`] maps an attachment's [`Category`] to the routine
//! that turns its bytes into plain text:
//!
//! | Category | Extractor |
//! |----------|-----------|
//! | Image | OCR ([`ocr::OcrEngine`]) |
//! | Pdf | text layer, OCR for text-less pages ([`pdf`]) |
//! | Tabular | CSV / XLSX rendered as labelled rows ([`tabular`]) |
//! | Slides, WordDoc | direct OOXML ([`ooxml`]), LibreOffice → PDF fallback |
//! | PlainText | UTF-8 decode (lossy, BOM stripped) |
//!
//! The match is exhaustive, so adding a category forces a decision here.
//! All routines are synchronous and may spawn external tools; call them
//! from a blocking task.

pub mod convert;
pub mod ocr;
pub mod ooxml;
pub mod pdf;
pub mod tabular;
mod tool;

use std::sync::Arc;
use std::time::Duration;

use docqa_core::category::{self, Category};
use docqa_core::models::Document;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ExtractionError;
use convert::{DocumentConverter, LibreOfficeConverter};
use ocr::{OcrEngine, TesseractOcr};

/// Text extracted from one attachment.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub category: Category,
    pub text: String,
}

/// Dispatches extraction by category.
pub struct ExtractorRegistry {
    ocr: Option<Arc<dyn OcrEngine>>,
    converter: Option<Arc<dyn DocumentConverter>>,
    max_bytes: usize,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new(25 * 1024 * 1024)
    }
}

impl ExtractorRegistry {
    /// A registry with no OCR engine and no converter.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            ocr: None,
            converter: None,
            max_bytes,
        }
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new(config.server.max_upload_bytes);
        if config.extract.ocr {
            registry = registry.with_ocr(Arc::new(TesseractOcr::from_config(&config.extract)));
        }
        if let Some(soffice) = &config.extract.converter {
            registry = registry.with_converter(Arc::new(LibreOfficeConverter::new(
                soffice.clone(),
                Duration::from_secs(config.extract.tool_timeout_secs),
            )));
        }
        registry
    }

    /// Extract the text of `bytes`, categorised by `filename`.
    ///
    /// Fails with [`ExtractionError::UnsupportedCategory`] for unknown
    /// extensions and [`ExtractionError::NoText`] when the file holds no
    /// text at all.
    pub fn extract(&self, bytes: &[u8], filename: &str) -> Result<Extracted, ExtractionError> {
        let category = Category::from_filename(filename);
        if category == Category::Unsupported {
            return Err(ExtractionError::UnsupportedCategory(filename.to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(ExtractionError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }
        let ext = category::extension(filename).unwrap_or_default();

        let text = match category {
            Category::Unsupported => {
                return Err(ExtractionError::UnsupportedCategory(filename.to_string()))
            }
            Category::Image => match &self.ocr {
                Some(ocr) => ocr.recognize_image(bytes, &ext)?,
                None => return Err(ExtractionError::OcrUnavailable),
            },
            Category::Pdf => pdf::pdf_text(bytes, self.ocr.as_deref())?,
            Category::Tabular if ext == "xlsx" => tabular::xlsx_text(bytes)?,
            Category::Tabular => tabular::csv_text(bytes)?,
            Category::Slides => self.office(bytes, &ext, ooxml::pptx_text)?,
            Category::WordDoc => self.office(bytes, &ext, ooxml::docx_text)?,
            Category::PlainText => plain_text(bytes),
        };

        if text.trim().is_empty() {
            return Err(ExtractionError::NoText);
        }
        debug!(filename, category = %category, chars = text.len(), "extracted attachment text");
        Ok(Extracted { category, text })
    }

    /// Extract into `doc.text`.
    pub fn extract_document(&self, doc: &mut Document) -> Result<(), ExtractionError> {
        let extracted = self.extract(&doc.bytes, &doc.filename)?;
        doc.text = Some(extracted.text);
        Ok(())
    }

    /// Direct OOXML parse, falling back to conversion + PDF extraction.
    ///
    /// Without a converter an unusable document is
    /// [`ExtractionError::ConversionUnavailable`].
    fn office(
        &self,
        bytes: &[u8],
        ext: &str,
        direct: fn(&[u8]) -> Result<String, ExtractionError>,
    ) -> Result<String, ExtractionError> {
        match direct(bytes) {
            Ok(text) if !text.trim().is_empty() => return Ok(text),
            Ok(_) => debug!("direct OOXML extraction found no text"),
            Err(e) => debug!(error = %e, "direct OOXML extraction failed"),
        }
        let Some(converter) = &self.converter else {
            return Err(ExtractionError::ConversionUnavailable);
        };
        let pdf = converter.to_pdf(bytes, ext).inspect_err(|e| {
            warn!(error = %e, "office to PDF conversion failed");
        })?;
        pdf::pdf_text(&pdf, self.ocr.as_deref())
    }
}

/// Decode plain text, dropping a UTF-8 BOM and replacing invalid sequences.
fn plain_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
