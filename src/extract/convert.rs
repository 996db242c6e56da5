//! Office → PDF conversion through a headless LibreOffice.
//!
//! Used as a fallback when direct OOXML parsing fails or yields nothing;
//! the resulting PDF then goes through the PDF path, OCR included.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;

use super::tool::{self, ToolError};
use crate::error::ExtractionError;

/// Converts an office document to PDF.
pub trait DocumentConverter: Send + Sync {
    fn to_pdf(&self, bytes: &[u8], extension: &str) -> Result<Vec<u8>, ExtractionError>;
}

pub struct LibreOfficeConverter {
    soffice: PathBuf,
    timeout: Duration,
}

impl LibreOfficeConverter {
    pub fn new(soffice: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            soffice: soffice.into(),
            timeout,
        }
    }
}

impl DocumentConverter for LibreOfficeConverter {
    fn to_pdf(&self, bytes: &[u8], extension: &str) -> Result<Vec<u8>, ExtractionError> {
        let dir = TempDir::new()?;
        let input = dir.path().join(format!("input.{}", extension));
        std::fs::write(&input, bytes)?;

        // A private profile lets concurrent conversions run side by side.
        let profile = format!("-env:UserInstallation=file://{}/profile", dir.path().display());
        tool::run(
            Command::new(&self.soffice)
                .arg("--headless")
                .arg(profile)
                .args(["--convert-to", "pdf", "--outdir"])
                .arg(dir.path())
                .arg(&input),
            dir.path(),
            self.timeout,
        )
        .map_err(|e| match e {
            ToolError::Missing => ExtractionError::ConversionUnavailable,
            other => ExtractionError::Conversion(other.to_string()),
        })?;

        std::fs::read(dir.path().join("input.pdf"))
            .map_err(|e| ExtractionError::Conversion(format!("no PDF produced: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_soffice_is_unavailable() {
        let conv = LibreOfficeConverter::new("docqa-no-such-soffice", Duration::from_secs(5));
        let err = conv.to_pdf(b"PK", "docx").unwrap_err();
        assert!(matches!(err, ExtractionError::ConversionUnavailable));
    }

    #[cfg(unix)]
    #[test]
    fn tool_that_writes_nothing_is_a_conversion_error() {
        let conv = LibreOfficeConverter::new("true", Duration::from_secs(5));
        let err = conv.to_pdf(b"PK", "docx").unwrap_err();
        assert!(matches!(err, ExtractionError::Conversion(_)));
    }
}
