//! Result types returned by the `extract*` entry points.

use crate::error::{ExtractError, PageError};
use crate::pipeline::classify::Classification;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Which branch of the pipeline produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// PDF with a usable native text layer; extracted directly.
    TextPdf,
    /// PDF without one; rasterised, recognised and reconstructed.
    ScannedPdf,
    /// Raster image input; recognised and reconstructed as a single unit.
    Image,
}

/// Outcome of one unit of the image-based branch.
///
/// A unit is a page (full-page render or raster input) or one embedded image
/// of a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 0-based source page index.
    pub page_index: usize,
    /// 0-based embedded-image index within the page, if any.
    pub image_index: Option<usize>,
    /// Text recovered from the reconstructed page, single-space joined.
    /// Empty when the unit failed.
    pub text: String,
    /// Positioned text runs written into the reconstructed page.
    pub runs: usize,
    /// Kept reconstructed PDF, when an artifact directory was configured.
    pub artifact: Option<PathBuf>,
    /// Set when the unit was skipped.
    pub error: Option<PageError>,
    pub duration_ms: u64,
}

impl PageOutcome {
    pub(crate) fn failed(page_index: usize, image_index: Option<usize>, error: PageError) -> Self {
        Self {
            page_index,
            image_index,
            text: String::new(),
            runs: 0,
            artifact: None,
            error: Some(error),
            duration_ms: 0,
        }
    }

    /// Merge key: page first, then occurrence within the page.
    pub fn order_key(&self) -> (usize, usize) {
        (self.page_index, self.image_index.unwrap_or(0))
    }
}

/// Run-level counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the source document (1 for raster inputs).
    pub total_pages: usize,
    /// Units sent through recognition.
    pub units: usize,
    /// Units that produced a reconstructed page.
    pub processed_units: usize,
    /// Distinct pages with at least one failed unit.
    pub skipped_pages: usize,
    pub total_duration_ms: u64,
}

/// Complete result of an extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Final normalized text: trimmed, non-blank lines sorted lexicographically.
    pub text: String,
    pub source_kind: SourceKind,
    /// Present for PDF inputs.
    pub classification: Option<Classification>,
    /// Per-unit outcomes in merge order. Empty for text-based PDFs.
    pub pages: Vec<PageOutcome>,
    /// 0-based indices of pages that degraded to "no text".
    pub skipped_pages: BTreeSet<usize>,
    /// Reconstructed PDFs kept on disk.
    pub artifacts: Vec<PathBuf>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// `true` when no page was skipped.
    pub fn is_complete(&self) -> bool {
        self.skipped_pages.is_empty()
    }

    /// Strict mode: turn any skipped page into [`ExtractError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, ExtractError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(ExtractError::PartialFailure {
                skipped: self.skipped_pages.len(),
                total: self.stats.total_pages,
            })
        }
    }
}
