//! OCR collaborator boundary: image in, positioned strings out.
//!
//! The engine itself is a black box behind [`TextRecognizer`]. A handle is
//! constructed explicitly and passed to the pipeline through
//! [`crate::config::ExtractionConfig::recognizer`], so tests can inject a
//! double and concurrent runs never share a hidden global instance.
//!
//! [`TesseractRecognizer`] is the default backend. It shells out to the
//! `tesseract` CLI in TSV mode and folds word rows into line records so the
//! reconstructor sees one run per text line.

use crate::pipeline::geometry::BoundingBox;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// How often a running engine process is checked against its time limit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One recognized region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    pub bbox: BoundingBox,
    pub text: String,
    /// Engine confidence in `0.0..=1.0`.
    pub confidence: f32,
}

/// Everything recognized in one image, in recognition order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub items: Vec<RecognizedText>,
}

impl RecognitionResult {
    pub fn new(items: Vec<RecognizedText>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Failure reported by a recognizer for one image.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("cannot read image '{path}': {detail}")]
    UnreadableImage { path: PathBuf, detail: String },

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    EngineFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("'{program}' killed after {secs}s")]
    TimedOut { program: String, secs: u64 },

    #[error("malformed recognizer output: {0}")]
    MalformedOutput(String),
}

/// Recognize text in a raster image.
///
/// Calls are synchronous and may block for a long time; the pipeline runs
/// them on the blocking pool under a timeout.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image_path: &Path) -> Result<RecognitionResult, OcrError>;
}

/// [`TextRecognizer`] backed by the `tesseract` command-line tool.
///
/// With a time limit set, a `tesseract` process still running at the
/// deadline is killed and the call fails with [`OcrError::TimedOut`].
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    program: String,
    language: String,
    time_limit: Option<Duration>,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl TesseractRecognizer {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
            time_limit: None,
        }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Wait for `child`, killing it once the time limit has passed.
    fn wait_bounded(
        &self,
        child: &mut std::process::Child,
    ) -> Result<std::process::ExitStatus, OcrError> {
        let spawn_err = |source| OcrError::Spawn {
            program: self.program.clone(),
            source,
        };
        let Some(limit) = self.time_limit else {
            return child.wait().map_err(spawn_err);
        };

        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait().map_err(spawn_err)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    warn!("could not kill '{}': {}", self.program, e);
                }
                // Reap the process so it does not linger as a zombie.
                let _ = child.wait();
                return Err(OcrError::TimedOut {
                    program: self.program.clone(),
                    secs: limit.as_secs(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image_path: &Path) -> Result<RecognitionResult, OcrError> {
        if !image_path.is_file() {
            return Err(OcrError::UnreadableImage {
                path: image_path.to_path_buf(),
                detail: "file does not exist".into(),
            });
        }

        // Spool to files: a polled child must never stall on a full pipe.
        let spool_err = |source| OcrError::Spawn {
            program: self.program.clone(),
            source,
        };
        let mut stdout = tempfile::tempfile().map_err(spool_err)?;
        let mut stderr = tempfile::tempfile().map_err(spool_err)?;

        let mut child = Command::new(&self.program)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("tsv")
            .stdin(Stdio::null())
            .stdout(stdout.try_clone().map_err(spool_err)?)
            .stderr(stderr.try_clone().map_err(spool_err)?)
            .spawn()
            .map_err(spool_err)?;

        let status = self.wait_bounded(&mut child)?;

        if !status.success() {
            let stderr = read_spool(&mut stderr).map_err(spool_err)?;
            return Err(OcrError::EngineFailed {
                program: self.program.clone(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        let stdout = read_spool(&mut stdout).map_err(spool_err)?;
        let tsv = String::from_utf8_lossy(&stdout).replace('\u{0000}', "");
        let result = parse_tsv(&tsv)?;
        debug!(
            "tesseract: {} lines from {}",
            result.len(),
            image_path.display()
        );
        Ok(result)
    }
}

fn read_spool(file: &mut std::fs::File) -> std::io::Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};
    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

// ── TSV parsing ──────────────────────────────────────────────────────────────

/// Tesseract's row level for individual words.
const WORD_LEVEL: u32 = 5;

#[derive(Default)]
struct LineAccumulator {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
    words: Vec<String>,
    confidence_sum: f32,
}

impl LineAccumulator {
    fn push(&mut self, left: f32, top: f32, width: f32, height: f32, conf: f32, word: &str) {
        if self.words.is_empty() {
            self.left = left;
            self.top = top;
            self.right = left + width;
            self.bottom = top + height;
        } else {
            self.left = self.left.min(left);
            self.top = self.top.min(top);
            self.right = self.right.max(left + width);
            self.bottom = self.bottom.max(top + height);
        }
        self.words.push(word.to_string());
        self.confidence_sum += conf;
    }

    fn finish(self) -> RecognizedText {
        let count = self.words.len().max(1) as f32;
        RecognizedText {
            bbox: BoundingBox::from_rect(
                self.left,
                self.top,
                self.right - self.left,
                self.bottom - self.top,
            ),
            text: self.words.join(" "),
            confidence: (self.confidence_sum / count / 100.0).clamp(0.0, 1.0),
        }
    }
}

/// Parse `tesseract ... tsv` output into line-level records.
///
/// Columns: `level page_num block_num par_num line_num word_num left top
/// width height conf text`. Only word rows with non-blank text contribute.
/// Lines keep the order in which tesseract first reported them.
pub fn parse_tsv(tsv: &str) -> Result<RecognitionResult, OcrError> {
    let mut order: Vec<(u32, u32, u32, u32)> = Vec::new();
    let mut lines: BTreeMap<(u32, u32, u32, u32), LineAccumulator> = BTreeMap::new();

    for (row, raw) in tsv.lines().enumerate() {
        if row == 0 && raw.starts_with("level") {
            continue;
        }
        if raw.trim().is_empty() {
            continue;
        }

        let cols: Vec<&str> = raw.splitn(12, '\t').collect();
        if cols.len() < 11 {
            return Err(OcrError::MalformedOutput(format!(
                "row {}: expected 12 columns, got {}",
                row + 1,
                cols.len()
            )));
        }

        let int = |i: usize| -> Result<u32, OcrError> {
            cols[i].trim().parse::<u32>().map_err(|_| {
                OcrError::MalformedOutput(format!("row {}: bad integer {:?}", row + 1, cols[i]))
            })
        };
        let num = |i: usize| -> Result<f32, OcrError> {
            cols[i].trim().parse::<f32>().map_err(|_| {
                OcrError::MalformedOutput(format!("row {}: bad number {:?}", row + 1, cols[i]))
            })
        };

        if int(0)? != WORD_LEVEL {
            continue;
        }
        let text = cols.get(11).map(|t| t.trim()).unwrap_or("");
        if text.is_empty() {
            continue;
        }

        let key = (int(1)?, int(2)?, int(3)?, int(4)?);
        let conf = num(10)?.max(0.0);
        let entry = lines.entry(key).or_insert_with(|| {
            order.push(key);
            LineAccumulator::default()
        });
        entry.push(num(6)?, num(7)?, num(8)?, num(9)?, conf, text);
    }

    let items = order
        .into_iter()
        .filter_map(|key| lines.remove(&key))
        .map(LineAccumulator::finish)
        .collect();

    Ok(RecognitionResult::new(items))
}
