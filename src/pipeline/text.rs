//! Native text extraction from PDFs that already carry a text layer.
//!
//! Unlike rasterisation, a page that fails here aborts the whole document:
//! native extraction is cheap and reliable, so a failure means the input is
//! broken rather than one page being hard to read.

use crate::error::ExtractError;
use crate::pipeline::document::PdfDocument;
use crate::pipeline::postprocess::join_trimmed_lines;
use tracing::debug;

/// Extract `doc`'s native text as one flat string: every line trimmed,
/// blank lines dropped, lines within a page and pages themselves joined by
/// single spaces.
///
/// # Errors
/// [`ExtractError::PageRead`] for the first page whose text cannot be
/// decoded.
pub fn extract_text(doc: &PdfDocument) -> Result<String, ExtractError> {
    let mut pages = Vec::with_capacity(doc.page_count());

    for page in doc.pages() {
        let raw = doc.page_text(page).map_err(|e| ExtractError::PageRead {
            page: page.index,
            detail: e.to_string(),
        })?;
        let cleaned = join_trimmed_lines(&raw);
        debug!("Page {}: {} native chars", page.index, cleaned.len());
        if !cleaned.is_empty() {
            pages.push(cleaned);
        }
    }

    Ok(pages.join(" "))
}
