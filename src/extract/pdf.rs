//! PDF text extraction with per-page OCR fallback.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use super::ocr::OcrEngine;
use crate::error::ExtractionError;

/// Text layer of each page, in page order.
fn page_texts(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    // pdf-extract panics on some malformed inputs.
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractionError::Pdf(e.to_string())),
        Err(_) => Err(ExtractionError::Pdf("parser panicked".to_string())),
    }
}

/// Extract a PDF's text.
///
/// Pages with a text layer are used as-is; pages without one are OCR'd when
/// an engine is available. If the text layer cannot be read at all the whole
/// document is OCR'd instead. Non-empty pages are joined with a single space.
pub fn pdf_text(bytes: &[u8], ocr: Option<&dyn OcrEngine>) -> Result<String, ExtractionError> {
    let pages = match page_texts(bytes) {
        Ok(pages) => pages,
        Err(err) => {
            let Some(ocr) = ocr else {
                return Err(err);
            };
            warn!(error = %err, "PDF text layer unreadable, falling back to full OCR");
            return non_empty(ocr.recognize_pdf(bytes)?);
        }
    };

    let mut parts = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
        let trimmed = page.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
            continue;
        }
        let Some(ocr) = ocr else { continue };
        debug!(page = i + 1, "page has no text layer, running OCR");
        match ocr.recognize_pdf_page(bytes, i + 1) {
            Ok(text) if !text.trim().is_empty() => parts.push(text.trim().to_string()),
            Ok(_) => {}
            // Without an engine no later page can be OCR'd either.
            Err(ExtractionError::OcrUnavailable) => {
                warn!("OCR unavailable, skipping text-less PDF pages");
                break;
            }
            Err(e) => warn!(page = i + 1, error = %e, "OCR failed for PDF page"),
        }
    }

    non_empty(parts.join(" "))
}

fn non_empty(text: String) -> Result<String, ExtractionError> {
    if text.trim().is_empty() {
        Err(ExtractionError::NoText)
    } else {
        Ok(text)
    }
}
