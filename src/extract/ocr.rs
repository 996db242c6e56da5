//! Optical character recognition for images and scanned PDF pages.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;

use super::tool::{self, ToolError};
use crate::config::ExtractConfig;
use crate::error::ExtractionError;

/// Recognises text in raster content.
///
/// Implementations are synchronous; the registry is always driven from a
/// blocking task.
pub trait OcrEngine: Send + Sync {
    /// OCR a single image file (PNG, JPEG, ...).
    fn recognize_image(&self, bytes: &[u8], extension: &str) -> Result<String, ExtractionError>;

    /// OCR one page (1-based) of a PDF.
    fn recognize_pdf_page(&self, pdf: &[u8], page: usize) -> Result<String, ExtractionError>;

    /// OCR every page of a PDF, pages separated by newlines.
    fn recognize_pdf(&self, pdf: &[u8]) -> Result<String, ExtractionError>;
}

/// OCR backed by the `tesseract` CLI, with `pdftoppm` for rasterising PDFs.
pub struct TesseractOcr {
    tesseract: PathBuf,
    pdftoppm: PathBuf,
    language: String,
    dpi: u32,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(tesseract: impl Into<PathBuf>, pdftoppm: impl Into<PathBuf>) -> Self {
        Self {
            tesseract: tesseract.into(),
            pdftoppm: pdftoppm.into(),
            language: "eng".to_string(),
            dpi: 300,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &ExtractConfig) -> Self {
        Self {
            tesseract: config.tesseract.clone(),
            pdftoppm: config.pdftoppm.clone(),
            language: config.ocr_language.clone(),
            dpi: config.ocr_dpi,
            timeout: Duration::from_secs(config.tool_timeout_secs),
        }
    }

    fn ocr_file(&self, dir: &TempDir, image: &std::path::Path) -> Result<String, ExtractionError> {
        let out_base = dir.path().join("ocr-out");
        tool::run(
            Command::new(&self.tesseract)
                .arg(image)
                .arg(&out_base)
                .args(["-l", self.language.as_str()]),
            dir.path(),
            self.timeout,
        )
        .map_err(ocr_error)?;
        let text = std::fs::read(out_base.with_extension("txt"))?;
        Ok(String::from_utf8_lossy(&text).trim().to_string())
    }

    /// Rasterise `pdf` into PNGs (optionally a single page) and OCR each.
    fn ocr_pdf_pages(&self, pdf: &[u8], page: Option<usize>) -> Result<String, ExtractionError> {
        let dir = TempDir::new()?;
        let input = dir.path().join("input.pdf");
        std::fs::write(&input, pdf)?;

        let mut cmd = Command::new(&self.pdftoppm);
        let dpi = self.dpi.to_string();
        cmd.args(["-r", dpi.as_str(), "-png"]);
        if let Some(n) = page {
            let n = n.to_string();
            cmd.args(["-f", n.as_str(), "-l", n.as_str()]);
        }
        cmd.arg(&input).arg(dir.path().join("page"));
        tool::run(&mut cmd, dir.path(), self.timeout).map_err(ocr_error)?;

        let mut images: Vec<PathBuf> = std::fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension().is_some_and(|e| e == "png")
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("page"))
            })
            .collect();
        // pdftoppm zero-pads page numbers, so a lexical sort is page order.
        images.sort();

        let mut pages = Vec::with_capacity(images.len());
        for image in &images {
            let text = self.ocr_file(&dir, image)?;
            if !text.is_empty() {
                pages.push(text);
            }
        }
        Ok(pages.join("\n"))
    }
}

fn ocr_error(err: ToolError) -> ExtractionError {
    match err {
        ToolError::Missing => ExtractionError::OcrUnavailable,
        other => ExtractionError::Ocr(other.to_string()),
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_image(&self, bytes: &[u8], extension: &str) -> Result<String, ExtractionError> {
        let dir = TempDir::new()?;
        let input = dir.path().join(format!("input.{}", extension));
        std::fs::write(&input, bytes)?;
        self.ocr_file(&dir, &input)
    }

    fn recognize_pdf_page(&self, pdf: &[u8], page: usize) -> Result<String, ExtractionError> {
        self.ocr_pdf_pages(pdf, Some(page))
    }

    fn recognize_pdf(&self, pdf: &[u8]) -> Result<String, ExtractionError> {
        self.ocr_pdf_pages(pdf, None)
    }
}
