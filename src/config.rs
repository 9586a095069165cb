//! Configuration types for document text extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Collaborators (the page rasterizer and
//! the text recognizer) are carried on the config as injectable handles and
//! resolved per run, so there is no process-wide state and tests can swap in
//! doubles.

use crate::error::ExtractError;
use crate::pipeline::classify::DEFAULT_TEXT_THRESHOLD;
use crate::pipeline::geometry::FontMetrics;
use crate::pipeline::ocr::TextRecognizer;
use crate::pipeline::render::PageRasterizer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_doc2text::{ExtractionConfig, RasterStrategy};
///
/// let config = ExtractionConfig::builder()
///     .zoom(3.0)
///     .concurrency(8)
///     .raster_strategy(RasterStrategy::EmbeddedImages)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Minimum number of native characters (after per-page trimming) a PDF
    /// needs to count as text-based. Strict `>` comparison. Default: 10.
    pub text_threshold: usize,

    /// Resolution multiplier for full-page renders. Range: 0.5–8.0. Default: 2.0.
    ///
    /// Higher zoom helps small print at proportional memory and time cost.
    pub zoom: f32,

    /// Smallest font size a reconstructed run may use. Default: 8.
    pub min_font_size: f32,

    /// Pixel box height divided by this gives the font size. Default: 1.5.
    pub font_height_divisor: f32,

    /// Number of image units rasterised and recognised concurrently. Default: 4.
    pub concurrency: usize,

    /// Per-OCR-call timeout in seconds. Expiry skips that page. Default: 120.
    pub ocr_timeout_secs: u64,

    /// How image-based PDFs are turned into images. Default: [`RasterStrategy::RenderPages`].
    pub raster_strategy: RasterStrategy,

    /// Directory in which to keep reconstructed PDFs. When `None` they live in
    /// the run's scratch space and are deleted with it.
    pub artifact_dir: Option<PathBuf>,

    /// Explicit pdfium library location (file or directory).
    pub pdfium_library_path: Option<PathBuf>,

    /// Tesseract executable used by the default recognizer. Default: `tesseract`.
    pub tesseract_command: String,

    /// Tesseract language pack used by the default recognizer. Default: `eng`.
    pub ocr_language: String,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Pre-constructed recognizer. Takes precedence over `tesseract_command`.
    pub recognizer: Option<Arc<dyn TextRecognizer>>,

    /// Pre-constructed rasterizer. Takes precedence over `pdfium_library_path`.
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let metrics = FontMetrics::default();
        Self {
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            zoom: 2.0,
            min_font_size: metrics.min_font_size,
            font_height_divisor: metrics.height_divisor,
            concurrency: 4,
            ocr_timeout_secs: 120,
            raster_strategy: RasterStrategy::default(),
            artifact_dir: None,
            pdfium_library_path: None,
            tesseract_command: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            download_timeout_secs: 120,
            recognizer: None,
            rasterizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("text_threshold", &self.text_threshold)
            .field("zoom", &self.zoom)
            .field("min_font_size", &self.min_font_size)
            .field("font_height_divisor", &self.font_height_divisor)
            .field("concurrency", &self.concurrency)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("raster_strategy", &self.raster_strategy)
            .field("artifact_dir", &self.artifact_dir)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("tesseract_command", &self.tesseract_command)
            .field("ocr_language", &self.ocr_language)
            .field(
                "recognizer",
                &self.recognizer.as_ref().map(|_| "<dyn TextRecognizer>"),
            )
            .field(
                "rasterizer",
                &self.rasterizer.as_ref().map(|_| "<dyn PageRasterizer>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Font estimation parameters for the reconstructor.
    pub fn font_metrics(&self) -> FontMetrics {
        FontMetrics {
            min_font_size: self.min_font_size,
            height_divisor: self.font_height_divisor,
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn text_threshold(mut self, chars: usize) -> Self {
        self.config.text_threshold = chars;
        self
    }

    pub fn zoom(mut self, zoom: f32) -> Self {
        self.config.zoom = zoom.clamp(0.5, 8.0);
        self
    }

    pub fn min_font_size(mut self, size: f32) -> Self {
        self.config.min_font_size = size;
        self
    }

    pub fn font_height_divisor(mut self, divisor: f32) -> Self {
        self.config.font_height_divisor = divisor;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn raster_strategy(mut self, strategy: RasterStrategy) -> Self {
        self.config.raster_strategy = strategy;
        self
    }

    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifact_dir = Some(dir.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn tesseract_command(mut self, program: impl Into<String>) -> Self {
        self.config.tesseract_command = program.into();
        self
    }

    pub fn ocr_language(mut self, language: impl Into<String>) -> Self {
        self.config.ocr_language = language.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if !(0.5..=8.0).contains(&c.zoom) {
            return Err(ExtractError::InvalidConfig(format!(
                "zoom must be 0.5–8.0, got {}",
                c.zoom
            )));
        }
        if c.min_font_size.is_nan() || c.min_font_size <= 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "min_font_size must be > 0, got {}",
                c.min_font_size
            )));
        }
        if c.font_height_divisor.is_nan() || c.font_height_divisor <= 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "font_height_divisor must be > 0, got {}",
                c.font_height_divisor
            )));
        }
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        if c.ocr_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "ocr_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.tesseract_command.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "tesseract_command must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How an image-based PDF is turned into images for recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RasterStrategy {
    /// Re-render every page at the configured zoom. Right for full-page scans. (default)
    #[default]
    RenderPages,
    /// Pull the raster objects already embedded in each page at their native
    /// resolution. Each image is recognised on its own.
    EmbeddedImages,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.text_threshold, 10);
        assert_eq!(c.zoom, 2.0);
        assert_eq!(c.min_font_size, 8.0);
        assert_eq!(c.font_height_divisor, 1.5);
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.raster_strategy, RasterStrategy::RenderPages);
        assert_eq!(c.tesseract_command, "tesseract");
        assert_eq!(c.ocr_language, "eng");
        assert!(c.recognizer.is_none());
        assert!(c.rasterizer.is_none());
    }

    #[test]
    fn builder_clamps_zoom_and_concurrency() {
        let c = ExtractionConfig::builder()
            .zoom(100.0)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.zoom, 8.0);
        assert_eq!(c.concurrency, 1);

        let c = ExtractionConfig::builder().zoom(0.01).build().unwrap();
        assert_eq!(c.zoom, 0.5);
    }

    #[test]
    fn build_rejects_non_positive_font_parameters() {
        assert!(matches!(
            ExtractionConfig::builder().min_font_size(0.0).build(),
            Err(ExtractError::InvalidConfig(_))
        ));
        assert!(matches!(
            ExtractionConfig::builder().font_height_divisor(-1.0).build(),
            Err(ExtractError::InvalidConfig(_))
        ));
        assert!(matches!(
            ExtractionConfig::builder()
                .font_height_divisor(f32::NAN)
                .build(),
            Err(ExtractError::InvalidConfig(_))
        ));
    }

    #[test]
    fn build_rejects_zero_ocr_timeout() {
        assert!(ExtractionConfig::builder().ocr_timeout_secs(0).build().is_err());
    }

    #[test]
    fn font_metrics_follow_config() {
        let c = ExtractionConfig::builder()
            .min_font_size(6.0)
            .font_height_divisor(2.0)
            .build()
            .unwrap();
        let m = c.font_metrics();
        assert_eq!(m.min_font_size, 6.0);
        assert_eq!(m.height_divisor, 2.0);
    }

    #[test]
    fn debug_hides_collaborators() {
        let c = ExtractionConfig::default();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("ExtractionConfig"));
        assert!(dbg.contains("recognizer: None"));
    }
}
