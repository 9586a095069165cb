//! # edgequake-doc2text
//!
//! Turn digital PDFs, scanned PDFs and raster images into normalized,
//! machine-readable text.
//!
//! PDFs that already carry a text layer are read directly. Everything else
//! is rasterised page by page, passed through a text recognizer, and rebuilt
//! as a one-page PDF whose text sits where the recognizer saw it (font size
//! estimated from the box height, coordinates flipped to the page's
//! bottom-left origin). The rebuilt page is then read back like any digital
//! PDF, so both branches finish with the same extractor.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input
//!  │
//!  ├─ 1. Input       resolve local file or download from URL
//!  ├─ 2. Classify    native text length > threshold ? text : image
//!  ├─ 3. Rasterise   pdfium page render or embedded-image pull (spawn_blocking)
//!  ├─ 4. Recognise   tesseract (or any TextRecognizer), per-call timeout
//!  ├─ 5. Rebuild     positioned text runs in a new PDF page (lopdf)
//!  ├─ 6. Extract     native text from the original or rebuilt pages
//!  └─ 7. Normalize   trim, drop blanks, sort lines
//! ```
//!
//! The final output is sorted alphabetically, not in reading order, so that
//! runs over similar documents can be diffed and deduplicated line by line.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2text::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let output = extract("invoice.pdf", &config).await?;
//!     println!("{}", output.text);
//!     if !output.skipped_pages.is_empty() {
//!         eprintln!("skipped pages: {:?}", output.skipped_pages);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! Scanned documents need a pdfium shared library (next to the binary, on
//! the system library path, or via `pdfium_library_path`) and a `tesseract`
//! executable. Neither is touched for text-based PDFs. Both sit behind
//! traits ([`PageRasterizer`], [`TextRecognizer`]) that can be replaced
//! through the config.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2text` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doc2text = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, RasterStrategy};
pub use error::{ExtractError, PageError};
pub use extract::{classify_path, extract, extract_from_bytes, extract_sync, extract_to_file};
pub use output::{ExtractionOutput, ExtractionStats, PageOutcome, SourceKind};
pub use pipeline::classify::{Classification, ClassificationVerdict};
pub use pipeline::geometry::{BoundingBox, FontMetrics, Point};
pub use pipeline::ocr::{OcrError, RecognitionResult, RecognizedText, TesseractRecognizer, TextRecognizer};
pub use pipeline::render::{extract_embedded_images, PageRasterizer, PdfiumRasterizer, RasterImage};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
