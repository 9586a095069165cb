//! Progress-callback trait for per-unit extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the image-based branch works through a document. Text-based
//! PDFs fire only the start and complete events.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2text::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SkipCounter {
//!     skipped: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for SkipCounter {
//!     fn on_page_skipped(&self, page_num: usize, _total: usize, error: &str) {
//!         self.skipped.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num} skipped: {error}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(SkipCounter { skipped: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each unit.
///
/// Units run concurrently, so `on_page_start`, `on_page_complete` and
/// `on_page_skipped` may be called from different threads at once. All
/// methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once the number of units is known, before any is processed.
    fn on_extraction_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called before a unit is rasterised. `page_num` is 1-indexed.
    fn on_page_start(&self, page_num: usize, total_units: usize) {
        let _ = (page_num, total_units);
    }

    /// Called when a unit produced a reconstructed page.
    ///
    /// `text_len` is the byte length of the text recovered from it.
    fn on_page_complete(&self, page_num: usize, total_units: usize, text_len: usize) {
        let _ = (page_num, total_units, text_len);
    }

    /// Called when a unit degraded to "no text".
    fn on_page_skipped(&self, page_num: usize, total_units: usize, error: &str) {
        let _ = (page_num, total_units, error);
    }

    /// Called once after every unit has been attempted.
    fn on_extraction_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
