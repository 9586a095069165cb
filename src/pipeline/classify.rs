//! Text-presence classification: does the PDF already carry a usable text
//! layer, or must it be treated as a scanned image?
//!
//! The verdict depends only on how much native text the pages yield. Font
//! resources are recorded as well, but a page can declare fonts and still
//! extract to nothing (outlined glyphs, invisible OCR overlays), so the
//! flag never changes the verdict.

use crate::pipeline::document::PdfDocument;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default minimum number of native characters, exclusive.
pub const DEFAULT_TEXT_THRESHOLD: usize = 10;

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationVerdict {
    /// Enough native text to extract directly.
    TextBased,
    /// Must go through rasterisation and OCR.
    ImageBased,
}

/// Verdict plus the evidence it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub verdict: ClassificationVerdict,
    /// Characters in the concatenation of every page's trimmed native text.
    pub text_chars: usize,
    /// Whether any page declares font resources. Informational only.
    pub has_fonts: bool,
    pub page_count: usize,
}

/// Classify `doc` against `threshold`: `TextBased` iff the concatenated,
/// per-page-trimmed native text is strictly longer than `threshold`
/// characters. A document with no pages is `ImageBased`.
///
/// Pages whose native text cannot be decoded count as empty; the scan
/// itself is read-only and never fails once the document is open.
pub fn classify(doc: &PdfDocument, threshold: usize) -> Classification {
    let mut total = String::new();
    let mut has_fonts = false;

    for page in doc.pages() {
        if doc.page_has_fonts(page) {
            has_fonts = true;
        }
        match doc.page_text(page) {
            Ok(text) => total.push_str(text.trim()),
            Err(e) => debug!("Page {}: no decodable native text ({})", page.index, e),
        }
    }

    let text_chars = total.chars().count();
    let verdict = verdict_for(text_chars, threshold);
    debug!(
        "Classified {}: {} chars, fonts={}, threshold={} → {:?}",
        doc.path().display(),
        text_chars,
        has_fonts,
        threshold,
        verdict
    );

    Classification {
        verdict,
        text_chars,
        has_fonts,
        page_count: doc.page_count(),
    }
}

fn verdict_for(text_chars: usize, threshold: usize) -> ClassificationVerdict {
    if text_chars > threshold {
        ClassificationVerdict::TextBased
    } else {
        ClassificationVerdict::ImageBased
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict() {
        assert_eq!(verdict_for(10, 10), ClassificationVerdict::ImageBased);
        assert_eq!(verdict_for(11, 10), ClassificationVerdict::TextBased);
        assert_eq!(verdict_for(0, 10), ClassificationVerdict::ImageBased);
    }

    #[test]
    fn zero_threshold_needs_one_char() {
        assert_eq!(verdict_for(0, 0), ClassificationVerdict::ImageBased);
        assert_eq!(verdict_for(1, 0), ClassificationVerdict::TextBased);
    }

    #[test]
    fn verdict_serialises_by_name() {
        let json = serde_json::to_string(&ClassificationVerdict::TextBased).unwrap();
        assert_eq!(json, "\"TextBased\"");
    }
}
