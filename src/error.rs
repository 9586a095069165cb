//! Error types for the edgequake-doc2text library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`]: **Fatal**: the run cannot proceed at all (missing
//!   input, unsupported extension, unparseable PDF, a page that fails native
//!   extraction). Returned as `Err(ExtractError)` from the `extract*` entry
//!   points.
//!
//! * [`PageError`]: **Non-fatal**: one unit of the image-based branch failed
//!   (rasterisation, OCR, reconstruction) while the rest of the document is
//!   fine. Stored inside [`crate::output::PageOutcome`] and recorded in the
//!   skipped-pages set.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2text library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The extension is neither `.pdf` nor a supported raster format.
    #[error(
        "Unsupported input format '{extension}' for '{path}'\n\
Supported: .pdf, .png, .jpg, .jpeg, .bmp, .tiff"
    )]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The PDF could not be parsed at all.
    #[error("Cannot open document '{path}': {detail}")]
    DocumentOpen { path: PathBuf, detail: String },

    /// Native text extraction failed on one page. Fatal: native extraction
    /// does not tolerate partial documents.
    #[error("Failed to read text from page {page}: {detail}")]
    PageRead { page: usize, detail: String },

    /// Strict mode: at least one page was skipped.
    ///
    /// Returned by [`crate::output::ExtractionOutput::into_result`] when the
    /// caller wants any degraded page treated as an error.
    #[error("{skipped}/{total} pages were skipped during extraction")]
    PartialFailure { skipped: usize, total: usize },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Scanned documents need pdfium for rasterisation. You can:\n\
  • Place libpdfium next to the binary (current directory).\n\
  • Install pdfium system-wide.\n\
  • Pass --pdfium-lib /path/to/libpdfium (or set DOC2TEXT_PDFIUM_LIB).\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The per-run scratch directory could not be created.
    #[error("Failed to create scratch directory: {0}")]
    ScratchSpace(#[source] std::io::Error),

    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single unit of the image-based branch.
///
/// `page` is the 0-based page index; for raster inputs it is always 0.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation or embedded-image extraction failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RasterFailed { page: usize, detail: String },

    /// The OCR collaborator returned an error.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The OCR collaborator did not answer within the configured timeout.
    #[error("Page {page}: OCR timed out after {secs}s")]
    OcrTimeout { page: usize, secs: u64 },

    /// Writing or re-reading the reconstructed page failed.
    #[error("Page {page}: reconstruction failed: {detail}")]
    ReconstructFailed { page: usize, detail: String },
}

impl PageError {
    /// 0-based index of the page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RasterFailed { page, .. }
            | PageError::OcrFailed { page, .. }
            | PageError::OcrTimeout { page, .. }
            | PageError::ReconstructFailed { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = ExtractError::PartialFailure {
            skipped: 1,
            total: 10,
        };
        assert!(e.to_string().contains("1/10"), "got: {e}");
    }

    #[test]
    fn unsupported_format_lists_extension() {
        let e = ExtractError::UnsupportedFormat {
            path: PathBuf::from("notes.docx"),
            extension: "docx".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("docx"));
        assert!(msg.contains(".tiff"));
    }

    #[test]
    fn page_read_display() {
        let e = ExtractError::PageRead {
            page: 3,
            detail: "bad xref".into(),
        };
        assert!(e.to_string().contains("page 3"));
        assert!(e.to_string().contains("bad xref"));
    }

    #[test]
    fn page_error_reports_its_page() {
        let errors = [
            PageError::RasterFailed {
                page: 1,
                detail: "x".into(),
            },
            PageError::OcrFailed {
                page: 1,
                detail: "x".into(),
            },
            PageError::OcrTimeout { page: 1, secs: 5 },
            PageError::ReconstructFailed {
                page: 1,
                detail: "x".into(),
            },
        ];
        assert!(errors.iter().all(|e| e.page() == 1));
    }

    #[test]
    fn ocr_timeout_display() {
        let e = PageError::OcrTimeout { page: 2, secs: 30 };
        assert!(e.to_string().contains("30s"));
    }
}
