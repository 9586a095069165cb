//! Extraction entry points and the per-document pipeline.
//!
//! ```text
//! input ─▶ classify ─┬─ TextBased ──▶ native text ─────────────────────────┐
//!                    └─ ImageBased ─▶ per page (bounded, unordered):       │
//!                                     rasterise ─▶ OCR ─▶ reconstruct ─▶   │
//!                                     re-extract                           │
//!                                     fold by (page, image) ───────────────┤
//!                                                                normalize ◀┘
//! ```
//!
//! Every run owns one [`ScratchSpace`]; it is created before the input is
//! resolved and dropped on every exit path, taking page images and
//! non-kept reconstructions with it.

use crate::config::{ExtractionConfig, RasterStrategy};
use crate::error::{ExtractError, PageError};
use crate::output::{ExtractionOutput, ExtractionStats, PageOutcome, SourceKind};
use crate::pipeline::classify::{classify, Classification, ClassificationVerdict};
use crate::pipeline::document::PdfDocument;
use crate::pipeline::geometry::FontMetrics;
use crate::pipeline::input::{self, InputKind, ResolvedInput, ScratchSpace};
use crate::pipeline::ocr::{TesseractRecognizer, TextRecognizer};
use crate::pipeline::postprocess::{join_pages, normalize};
use crate::pipeline::reconstruct::reconstruct;
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer, RasterImage};
use crate::pipeline::text;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extract normalized text from a PDF or raster image (path or URL).
///
/// # Returns
/// `Ok(ExtractionOutput)` even if some pages were skipped; check
/// `output.skipped_pages` or call [`ExtractionOutput::into_result`].
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal errors: missing or unreadable
/// input, unsupported extension, an unparseable PDF, a page that fails native
/// extraction, or pdfium not being available for a scanned PDF.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let started = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let scratch = ScratchSpace::new()?;
    let resolved = input::resolve_input(input_str, &scratch, config.download_timeout_secs).await?;

    if let Some(ref dir) = config.artifact_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ExtractError::OutputWriteFailed {
                path: dir.clone(),
                source: e,
            })?;
    }

    let output = match resolved.kind {
        InputKind::Pdf => extract_pdf(&resolved, &scratch, config, started).await?,
        InputKind::Image => extract_image(&resolved, &scratch, config, started).await,
    };

    info!(
        "Extraction complete: {} lines, {} skipped pages, {}ms",
        output.text.lines().count(),
        output.skipped_pages.len(),
        output.stats.total_duration_ms
    );
    Ok(output)
}

/// Extract text and write it to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let output = extract(input_str, config).await?;
    let path = output_path.as_ref();
    let write_err = |e| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, &output.text)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally. The runtime is shut down
/// without waiting on recognizer calls abandoned at their timeout, so this
/// returns as soon as the result is ready.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    let result = rt.block_on(extract(input_str, config));
    rt.shutdown_background();
    result
}

/// Extract text from an in-memory PDF or image.
///
/// The format is sniffed from the content (`%PDF` header, else the image
/// signature); the bytes are spilled to a managed temp file that is removed
/// on return.
///
/// # Example
/// ```rust,no_run
/// use edgequake_doc2text::{extract_from_bytes, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("scan.png")?;
/// let output = extract_from_bytes(&bytes, &ExtractionConfig::default()).await?;
/// println!("{}", output.text);
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let extension = sniff_extension(bytes).ok_or_else(|| ExtractError::UnsupportedFormat {
        path: PathBuf::from("<bytes>"),
        extension: "unknown".to_string(),
    })?;

    let mut tmp = tempfile::Builder::new()
        .prefix("doc2text_")
        .suffix(&format!(".{extension}"))
        .tempfile()
        .map_err(ExtractError::ScratchSpace)?;
    tmp.write_all(bytes).map_err(ExtractError::ScratchSpace)?;
    tmp.flush().map_err(ExtractError::ScratchSpace)?;

    let path = tmp.path().to_string_lossy().to_string();
    // `tmp` is dropped (and the file deleted) when `extract` returns
    extract(&path, config).await
}

/// Classify a document without running OCR.
///
/// Raster images are image-based by definition and report one page.
pub async fn classify_path(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<Classification, ExtractError> {
    let scratch = ScratchSpace::new()?;
    let resolved =
        input::resolve_input(input_str.as_ref(), &scratch, config.download_timeout_secs).await?;

    match resolved.kind {
        InputKind::Image => Ok(Classification {
            verdict: ClassificationVerdict::ImageBased,
            text_chars: 0,
            has_fonts: false,
            page_count: 1,
        }),
        InputKind::Pdf => {
            let path = resolved.path.clone();
            let threshold = config.text_threshold;
            tokio::task::spawn_blocking(move || -> Result<Classification, ExtractError> {
                let doc = PdfDocument::open(&path)?;
                Ok(classify(&doc, threshold))
            })
            .await
            .map_err(|e| ExtractError::Internal(format!("classification task failed: {e}")))?
        }
    }
}

// ── PDF branch ───────────────────────────────────────────────────────────

async fn extract_pdf(
    resolved: &ResolvedInput,
    scratch: &ScratchSpace,
    config: &ExtractionConfig,
    started: Instant,
) -> Result<ExtractionOutput, ExtractError> {
    let path = resolved.path.clone();
    let threshold = config.text_threshold;

    // lopdf parsing is CPU-bound: open, classify and (for text-based PDFs)
    // extract in one blocking task.
    let (classification, native) = tokio::task::spawn_blocking(
        move || -> Result<(Classification, Option<String>), ExtractError> {
            let doc = PdfDocument::open(&path)?;
            let classification = classify(&doc, threshold);
            let native = match classification.verdict {
                ClassificationVerdict::TextBased => Some(text::extract_text(&doc)?),
                ClassificationVerdict::ImageBased => None,
            };
            Ok((classification, native))
        },
    )
    .await
    .map_err(|e| ExtractError::Internal(format!("document task failed: {e}")))??;

    info!(
        "{}: {} pages, {} native chars → {:?}",
        resolved.path.display(),
        classification.page_count,
        classification.text_chars,
        classification.verdict
    );
    if classification.has_fonts && classification.verdict == ClassificationVerdict::ImageBased {
        debug!("Fonts are declared but yield no usable text; treating as scanned");
    }

    if let Some(native) = native {
        if let Some(ref cb) = config.progress_callback {
            cb.on_extraction_start(classification.page_count);
            cb.on_extraction_complete(classification.page_count, classification.page_count);
        }
        return Ok(ExtractionOutput {
            text: normalize(&native),
            source_kind: SourceKind::TextPdf,
            stats: ExtractionStats {
                total_pages: classification.page_count,
                total_duration_ms: started.elapsed().as_millis() as u64,
                ..Default::default()
            },
            classification: Some(classification),
            pages: Vec::new(),
            skipped_pages: BTreeSet::new(),
            artifacts: Vec::new(),
        });
    }

    if classification.page_count == 0 {
        // Nothing to rasterise; pdfium is not needed.
        let ctx = RunContext::new(resolved, scratch, config, 0);
        if let Some(ref cb) = ctx.progress {
            cb.on_extraction_start(0);
        }
        return Ok(assemble(
            Vec::new(),
            SourceKind::ScannedPdf,
            Some(classification),
            &ctx,
            started,
        ));
    }

    let rasterizer = resolve_rasterizer(config).await?;
    let ctx = Arc::new(RunContext::new(
        resolved,
        scratch,
        config,
        classification.page_count,
    ));

    if let Some(ref cb) = ctx.progress {
        cb.on_extraction_start(ctx.total_units);
    }

    let per_page: Vec<Vec<PageOutcome>> =
        stream::iter((0..classification.page_count).map(|page_index| {
            let ctx = Arc::clone(&ctx);
            let rasterizer = Arc::clone(&rasterizer);
            async move { process_page(&ctx, rasterizer, page_index).await }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    let outcomes = per_page.into_iter().flatten().collect();
    Ok(assemble(
        outcomes,
        SourceKind::ScannedPdf,
        Some(classification),
        &ctx,
        started,
    ))
}

/// Rasterise one page with the configured strategy and run every resulting
/// image through recognition and reconstruction.
async fn process_page(
    ctx: &RunContext,
    rasterizer: Arc<dyn PageRasterizer>,
    page_index: usize,
) -> Vec<PageOutcome> {
    ctx.page_started(page_index);

    let pdf_path = ctx.source.clone();
    let out_dir = ctx.scratch_dir.clone();
    let zoom = ctx.zoom;
    let strategy = ctx.strategy;

    let rastered = tokio::task::spawn_blocking(move || match strategy {
        RasterStrategy::RenderPages => rasterizer
            .rasterize_page(&pdf_path, page_index, zoom, &out_dir)
            .map(|image| vec![image]),
        RasterStrategy::EmbeddedImages => {
            rasterizer.extract_page_images(&pdf_path, page_index, &out_dir)
        }
    })
    .await
    .unwrap_or_else(|e| {
        Err(PageError::RasterFailed {
            page: page_index,
            detail: format!("rasteriser task failed: {e}"),
        })
    });

    let outcomes = match rastered {
        Ok(images) => {
            debug!("Page {}: {} image(s) to recognise", page_index, images.len());
            let mut outcomes = Vec::with_capacity(images.len());
            for raster in images {
                let image_path = raster.path.clone();
                outcomes.push(process_raster(ctx, raster).await);
                // Page images are scratch files; drop each as soon as it is read.
                let _ = tokio::fs::remove_file(&image_path).await;
            }
            outcomes
        }
        Err(e) => vec![PageOutcome::failed(page_index, None, e)],
    };

    ctx.page_finished(page_index, &outcomes);
    outcomes
}

// ── Raster image branch ──────────────────────────────────────────────────

async fn extract_image(
    resolved: &ResolvedInput,
    scratch: &ScratchSpace,
    config: &ExtractionConfig,
    started: Instant,
) -> ExtractionOutput {
    let ctx = RunContext::new(resolved, scratch, config, 1);

    if let Some(ref cb) = ctx.progress {
        cb.on_extraction_start(1);
    }
    ctx.page_started(0);

    let outcome = match raster_input(&resolved.path) {
        Ok(raster) => process_raster(&ctx, raster).await,
        Err(e) => PageOutcome::failed(0, None, e),
    };
    let outcomes = vec![outcome];
    ctx.page_finished(0, &outcomes);

    assemble(outcomes, SourceKind::Image, None, &ctx, started)
}

/// Describe a raster input file in place. The file is never modified.
fn raster_input(path: &Path) -> Result<RasterImage, PageError> {
    let (width, height) = image::image_dimensions(path).map_err(|e| PageError::RasterFailed {
        page: 0,
        detail: format!("cannot read image {}: {}", path.display(), e),
    })?;
    Ok(RasterImage {
        page_index: 0,
        image_index: None,
        path: path.to_path_buf(),
        width,
        height,
    })
}

// ── Shared unit processing ───────────────────────────────────────────────

/// Recognise → reconstruct → re-extract for one image. Never fails: any
/// error degrades the unit to "no text".
async fn process_raster(ctx: &RunContext, raster: RasterImage) -> PageOutcome {
    let unit_started = Instant::now();
    let page = raster.page_index;
    let image_index = raster.image_index;

    // ── Recognize ────────────────────────────────────────────────────────
    let recognizer = Arc::clone(&ctx.recognizer);
    let image_path = raster.path.clone();
    let ocr = tokio::task::spawn_blocking(move || recognizer.recognize(&image_path));

    let recognition = match tokio::time::timeout(ctx.ocr_timeout, ocr).await {
        Err(_) => {
            return PageOutcome::failed(
                page,
                image_index,
                PageError::OcrTimeout {
                    page,
                    secs: ctx.ocr_timeout.as_secs(),
                },
            )
        }
        Ok(Err(join)) => {
            return PageOutcome::failed(
                page,
                image_index,
                PageError::OcrFailed {
                    page,
                    detail: format!("recognizer task failed: {join}"),
                },
            )
        }
        Ok(Ok(Err(e))) => {
            return PageOutcome::failed(
                page,
                image_index,
                PageError::OcrFailed {
                    page,
                    detail: e.to_string(),
                },
            )
        }
        Ok(Ok(Ok(result))) => result,
    };
    debug!(
        "Page {}: {} recognised items from {}",
        page,
        recognition.len(),
        raster.path.display()
    );

    // ── Reconstruct and re-extract ───────────────────────────────────────
    let metrics = ctx.metrics;
    let pdf_path = ctx.artifact_path(&raster);
    let (width, height) = (raster.width as f32, raster.height as f32);
    let written = pdf_path.clone();

    let rebuilt = tokio::task::spawn_blocking(move || -> Result<(usize, String), String> {
        let rebuilt = reconstruct(&recognition, width, height, &metrics);
        rebuilt
            .write_pdf(&written)
            .map_err(|e| format!("cannot write {}: {}", written.display(), e))?;
        let doc = PdfDocument::open(&written).map_err(|e| e.to_string())?;
        let text = text::extract_text(&doc).map_err(|e| e.to_string())?;
        Ok((rebuilt.runs.len(), text))
    })
    .await
    .unwrap_or_else(|e| Err(format!("reconstruction task failed: {e}")));

    match rebuilt {
        Ok((runs, text)) => PageOutcome {
            page_index: page,
            image_index,
            text,
            runs,
            artifact: ctx.artifact_dir.as_ref().map(|_| pdf_path),
            error: None,
            duration_ms: unit_started.elapsed().as_millis() as u64,
        },
        Err(detail) => PageOutcome::failed(
            page,
            image_index,
            PageError::ReconstructFailed { page, detail },
        ),
    }
}

/// Fold unit outcomes in `(page, image)` order into the final output.
fn assemble(
    mut outcomes: Vec<PageOutcome>,
    source_kind: SourceKind,
    classification: Option<Classification>,
    ctx: &RunContext,
    started: Instant,
) -> ExtractionOutput {
    outcomes.sort_by_key(PageOutcome::order_key);

    let skipped_pages: BTreeSet<usize> = outcomes
        .iter()
        .filter(|o| o.error.is_some())
        .map(|o| o.page_index)
        .collect();
    let artifacts: Vec<PathBuf> = outcomes.iter().filter_map(|o| o.artifact.clone()).collect();
    let aggregated = join_pages(outcomes.iter().map(|o| o.text.as_str()));
    let processed_units = outcomes.iter().filter(|o| o.error.is_none()).count();

    if let Some(ref cb) = ctx.progress {
        cb.on_extraction_complete(ctx.total_units, ctx.total_units - skipped_pages.len());
    }

    ExtractionOutput {
        text: normalize(&aggregated),
        source_kind,
        classification,
        stats: ExtractionStats {
            total_pages: ctx.total_units,
            units: outcomes.len(),
            processed_units,
            skipped_pages: skipped_pages.len(),
            total_duration_ms: started.elapsed().as_millis() as u64,
        },
        pages: outcomes,
        skipped_pages,
        artifacts,
    }
}

// ── Run context ──────────────────────────────────────────────────────────

/// Everything a unit needs, shared read-only across concurrent units.
struct RunContext {
    source: PathBuf,
    stem: String,
    scratch_dir: PathBuf,
    artifact_dir: Option<PathBuf>,
    recognizer: Arc<dyn TextRecognizer>,
    zoom: f32,
    strategy: RasterStrategy,
    metrics: FontMetrics,
    ocr_timeout: Duration,
    progress: Option<ProgressCallback>,
    total_units: usize,
}

impl RunContext {
    fn new(
        resolved: &ResolvedInput,
        scratch: &ScratchSpace,
        config: &ExtractionConfig,
        total_units: usize,
    ) -> Self {
        Self {
            source: resolved.path.clone(),
            stem: resolved.stem(),
            scratch_dir: scratch.path().to_path_buf(),
            artifact_dir: config.artifact_dir.clone(),
            recognizer: resolve_recognizer(config),
            zoom: config.zoom,
            strategy: config.raster_strategy,
            metrics: config.font_metrics(),
            ocr_timeout: Duration::from_secs(config.ocr_timeout_secs),
            progress: config.progress_callback.clone(),
            total_units,
        }
    }

    /// `{stem}_page_{p}.pdf` or `{stem}_page_{p}_img_{i}.pdf`, 1-based, in the
    /// artifact directory when configured and in scratch space otherwise.
    fn artifact_path(&self, raster: &RasterImage) -> PathBuf {
        let name = artifact_name(&self.stem, raster.page_index, raster.image_index);
        self.artifact_dir
            .as_deref()
            .unwrap_or(&self.scratch_dir)
            .join(name)
    }

    fn page_started(&self, page_index: usize) {
        if let Some(ref cb) = self.progress {
            cb.on_page_start(page_index + 1, self.total_units);
        }
    }

    fn page_finished(&self, page_index: usize, outcomes: &[PageOutcome]) {
        let failure = outcomes.iter().find_map(|o| o.error.as_ref());
        if let Some(e) = failure {
            warn!("Skipping page {}: {}", page_index, e);
        }
        if let Some(ref cb) = self.progress {
            match failure {
                Some(e) => cb.on_page_skipped(page_index + 1, self.total_units, &e.to_string()),
                None => cb.on_page_complete(
                    page_index + 1,
                    self.total_units,
                    outcomes.iter().map(|o| o.text.len()).sum(),
                ),
            }
        }
    }
}

/// Name of the reconstructed PDF for one unit (1-based indices).
pub fn artifact_name(stem: &str, page_index: usize, image_index: Option<usize>) -> String {
    match image_index {
        Some(i) => format!("{}_page_{}_img_{}.pdf", stem, page_index + 1, i + 1),
        None => format!("{}_page_{}.pdf", stem, page_index + 1),
    }
}

// ── Collaborator resolution ──────────────────────────────────────────────

/// The injected recognizer, or tesseract as configured. The default
/// recognizer kills its engine process at the OCR timeout.
fn resolve_recognizer(config: &ExtractionConfig) -> Arc<dyn TextRecognizer> {
    match config.recognizer {
        Some(ref recognizer) => Arc::clone(recognizer),
        None => Arc::new(
            TesseractRecognizer::new(
                config.tesseract_command.clone(),
                config.ocr_language.clone(),
            )
            .with_time_limit(Duration::from_secs(config.ocr_timeout_secs)),
        ),
    }
}

/// The injected rasterizer, or pdfium. A default pdfium rasterizer is
/// bound once up front so a missing library fails the run instead of
/// skipping every page.
async fn resolve_rasterizer(
    config: &ExtractionConfig,
) -> Result<Arc<dyn PageRasterizer>, ExtractError> {
    if let Some(ref rasterizer) = config.rasterizer {
        return Ok(Arc::clone(rasterizer));
    }

    let rasterizer = match config.pdfium_library_path {
        Some(ref path) => PdfiumRasterizer::with_library_path(path),
        None => PdfiumRasterizer::new(),
    };
    let candidate = rasterizer.clone();
    tokio::task::spawn_blocking(move || candidate.check_binding())
        .await
        .map_err(|e| ExtractError::Internal(format!("pdfium binding check failed: {e}")))??;

    Ok(Arc::new(rasterizer))
}

/// File extension matching the content of `bytes`, if supported.
fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        return Some("pdf");
    }
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Png => Some("png"),
        image::ImageFormat::Jpeg => Some("jpg"),
        image::ImageFormat::Bmp => Some("bmp"),
        image::ImageFormat::Tiff => Some("tiff"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_are_one_based() {
        assert_eq!(artifact_name("scan", 0, None), "scan_page_1.pdf");
        assert_eq!(artifact_name("scan", 1, Some(0)), "scan_page_2_img_1.pdf");
    }

    #[test]
    fn sniff_recognises_pdf_and_images() {
        assert_eq!(sniff_extension(b"%PDF-1.7\n..."), Some("pdf"));
        assert_eq!(
            sniff_extension(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            Some("png")
        );
        assert_eq!(sniff_extension(b"\xFF\xD8\xFF\xE0\0\x10JFIF"), Some("jpg"));
        assert_eq!(sniff_extension(b"plain text"), None);
        assert_eq!(sniff_extension(b""), None);
    }

    #[test]
    fn default_recognizer_is_tesseract() {
        let config = ExtractionConfig::default();
        // Resolves without touching the filesystem or spawning anything.
        let _ = resolve_recognizer(&config);
    }
}
