//! CLI binary for edgequake-doc2text.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doc2text::{
    classify_path, extract, extract_to_file, ExtractionConfig, ExtractionOutput,
    ExtractionProgressCallback, ProgressCallback, RasterStrategy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── Terminal output ──────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Tone {
    Good = 32,
    Bad = 31,
    Warn = 33,
    Faint = 2,
}

fn paint(tone: Tone, s: &str) -> String {
    format!("\x1b[{}m{s}\x1b[0m", tone as u8)
}

/// Progress for the image-based branch: one bar over all units plus a log
/// line per finished page. Pages may finish out of order.
struct UnitProgress {
    bar: ProgressBar,
    started: Mutex<HashMap<usize, Instant>>,
}

impl UnitProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_message("classifying…");
        bar.enable_steady_tick(Duration::from_millis(100));
        Arc::new(Self {
            bar,
            started: Mutex::new(HashMap::new()),
        })
    }

    fn report(&self, page_num: usize, total: usize, mark: String, detail: String) {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.bar.println(format!(
            "  {mark} page {page_num:>3}/{total:<3}  {detail}  {}",
            paint(Tone::Faint, &format!("{secs:.1}s"))
        ));
        self.bar.inc(1);
    }
}

impl ExtractionProgressCallback for UnitProgress {
    fn on_extraction_start(&self, total_units: usize) {
        let style = ProgressStyle::with_template(
            "{spinner} OCR [{wide_bar}] {pos}/{len} pages  {elapsed}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        self.bar.set_style(style);
        self.bar.set_length(total_units as u64);
        self.bar.set_message("");
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.started.lock() {
            m.insert(page_num, Instant::now());
        }
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        self.report(
            page_num,
            total,
            paint(Tone::Good, "ok"),
            paint(Tone::Faint, &format!("{text_len} chars")),
        );
    }

    fn on_page_skipped(&self, page_num: usize, total: usize, error: &str) {
        let mut reason: String = error.chars().take(80).collect();
        if reason.len() < error.len() {
            reason.push('…');
        }
        self.report(page_num, total, paint(Tone::Bad, "skipped"), paint(Tone::Bad, &reason));
    }

    fn on_extraction_complete(&self, _total_units: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text to stdout
  doc2text invoice.pdf

  # Write to a file
  doc2text scan.pdf -o scan.txt

  # Scanned PDF made of embedded photos, keep the rebuilt pages
  doc2text --embedded-images --artifact-dir rebuilt/ photos.pdf

  # Raster image input
  doc2text receipt.jpg

  # Only report whether the PDF has a usable text layer
  doc2text --classify-only document.pdf

  # Full structured result, to stdout or to a file
  doc2text --json scan.pdf > result.json
  doc2text --json scan.pdf -o result.json

  # Fail (exit 1) if any page had to be skipped
  doc2text --strict scan.pdf

OUTPUT:
  Lines are trimmed, blank lines dropped, and the remaining lines sorted
  alphabetically. Output order is not reading order.

EXTERNAL TOOLS (scanned input only):
  pdfium      shared library; looked up in ./ then system-wide, or --pdfium-lib
  tesseract   executable on PATH, or --tesseract
"#;

/// Extract normalized text from PDFs and images, with OCR for scans.
#[derive(Parser, Debug)]
#[command(
    name = "doc2text",
    version,
    about = "Extract normalized text from PDFs and images, with OCR for scans",
    long_about = "Extract text from digital PDFs, scanned PDFs and raster images. \
PDFs with a native text layer are read directly; everything else is rasterised, \
recognised with tesseract, rebuilt as a positioned-text PDF and read back.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path (.pdf .png .jpg .jpeg .bmp .tiff) or HTTP/HTTPS URL.
    input: String,

    /// Write the result (text, or JSON with --json) to this file instead of stdout.
    #[arg(short, long, env = "DOC2TEXT_OUTPUT")]
    output: Option<PathBuf>,

    /// Minimum native characters for a PDF to count as text-based.
    #[arg(long, env = "DOC2TEXT_TEXT_THRESHOLD", default_value_t = 10)]
    text_threshold: usize,

    /// Page render zoom factor (0.5–8).
    #[arg(long, env = "DOC2TEXT_ZOOM", default_value_t = 2.0)]
    zoom: f32,

    /// Smallest font size used when rebuilding pages.
    #[arg(long, env = "DOC2TEXT_MIN_FONT_SIZE", default_value_t = 8.0)]
    min_font_size: f32,

    /// Box height (px) divided by this gives the font size.
    #[arg(long, env = "DOC2TEXT_FONT_DIVISOR", default_value_t = 1.5)]
    font_divisor: f32,

    /// Number of pages processed concurrently.
    #[arg(short, long, env = "DOC2TEXT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-page OCR timeout in seconds.
    #[arg(long, env = "DOC2TEXT_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,

    /// Recognise the images embedded in each page instead of rendering pages.
    #[arg(long, env = "DOC2TEXT_EMBEDDED_IMAGES")]
    embedded_images: bool,

    /// Keep the rebuilt per-page PDFs in this directory.
    #[arg(long, env = "DOC2TEXT_ARTIFACT_DIR")]
    artifact_dir: Option<PathBuf>,

    /// Path to the pdfium shared library (file or directory).
    #[arg(long, env = "DOC2TEXT_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Tesseract executable.
    #[arg(long, env = "DOC2TEXT_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Tesseract language(s), e.g. eng or eng+deu.
    #[arg(short, long, env = "DOC2TEXT_LANG", default_value = "eng")]
    lang: String,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOC2TEXT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the classification only, no OCR.
    #[arg(long)]
    classify_only: bool,

    /// Output structured JSON (ExtractionOutput) instead of plain text.
    #[arg(long, env = "DOC2TEXT_JSON")]
    json: bool,

    /// Exit with an error if any page was skipped.
    #[arg(long, env = "DOC2TEXT_STRICT")]
    strict: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOC2TEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2TEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2TEXT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would interleave with the bar; keep them off while it runs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.classify_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(UnitProgress::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Classify-only mode ───────────────────────────────────────────────
    if cli.classify_only {
        let classification = classify_path(&cli.input, &config)
            .await
            .context("Failed to classify document")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&classification)
                    .context("Failed to serialize classification")?
            );
        } else {
            println!("File:         {}", cli.input);
            println!("Verdict:      {:?}", classification.verdict);
            println!("Pages:        {}", classification.page_count);
            println!("Native chars: {}", classification.text_chars);
            println!("Has fonts:    {}", classification.has_fonts);
        }
        return Ok(());
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let output = match (&cli.output, cli.json) {
        (Some(path), false) => {
            let output = extract_to_file(&cli.input, path, &config)
                .await
                .context("Extraction failed")?;
            report_written(&cli, &output, path);
            output
        }
        (Some(path), true) => {
            let output = extract(&cli.input, &config)
                .await
                .context("Extraction failed")?;
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            report_written(&cli, &output, path);
            output
        }
        (None, json) => {
            let output = extract(&cli.input, &config)
                .await
                .context("Extraction failed")?;
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            if json {
                let json = serde_json::to_string_pretty(&output)
                    .context("Failed to serialise output")?;
                writeln!(handle, "{json}").context("Failed to write to stdout")?;
            } else if !output.text.is_empty() {
                writeln!(handle, "{}", output.text).context("Failed to write to stdout")?;
            }
            output
        }
    };

    if !cli.quiet && !cli.json && !output.skipped_pages.is_empty() {
        let pages: Vec<String> = output
            .skipped_pages
            .iter()
            .map(|p| (p + 1).to_string())
            .collect();
        eprintln!("{} skipped pages: {}", paint(Tone::Warn, "!"), pages.join(", "));
    }

    if cli.strict {
        output.into_result().context("Strict mode")?;
    }

    Ok(())
}

fn report_written(cli: &Cli, output: &ExtractionOutput, path: &std::path::Path) {
    if cli.quiet {
        return;
    }
    let mark = if output.is_complete() {
        paint(Tone::Good, "done")
    } else {
        paint(Tone::Warn, "partial")
    };
    eprintln!(
        "{mark}  {} lines  {}ms  -> {}",
        output.text.lines().count(),
        output.stats.total_duration_ms,
        path.display()
    );
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let strategy = if cli.embedded_images {
        RasterStrategy::EmbeddedImages
    } else {
        RasterStrategy::RenderPages
    };

    let mut builder = ExtractionConfig::builder()
        .text_threshold(cli.text_threshold)
        .zoom(cli.zoom)
        .min_font_size(cli.min_font_size)
        .font_height_divisor(cli.font_divisor)
        .concurrency(cli.concurrency)
        .ocr_timeout_secs(cli.ocr_timeout)
        .raster_strategy(strategy)
        .tesseract_command(cli.tesseract.clone())
        .ocr_language(cli.lang.clone())
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref dir) = cli.artifact_dir {
        builder = builder.artifact_dir(dir.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
