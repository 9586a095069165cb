//! Input resolution: normalise a user-supplied path or URL to a local file
//! of a known kind, and own the per-run scratch directory.
//!
//! ## Scratch space
//!
//! Every run gets exactly one [`ScratchSpace`], a fresh `ocr_process_*`
//! temporary directory. Page images, downloaded inputs and (unless the
//! caller asked to keep them) reconstructed PDFs all live there. It is
//! removed when the value is dropped, which covers early returns, `?`
//! propagation and panics alike, and it is never shared between runs.

use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Raster extensions accepted as direct input (lower-case).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff"];

/// What kind of document the input is, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
}

/// A resolved, validated local input file.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub kind: InputKind,
}

impl ResolvedInput {
    /// File stem used to name output artifacts.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// The per-run scoped temporary directory.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    pub fn new() -> Result<Self, ExtractError> {
        let dir = tempfile::Builder::new()
            .prefix("ocr_process_")
            .tempdir()
            .map_err(ExtractError::ScratchSpace)?;
        debug!("Scratch space: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Classify `path` by extension (case-insensitive).
pub fn detect_kind(path: &Path) -> Result<InputKind, ExtractError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if extension == "pdf" {
        Ok(InputKind::Pdf)
    } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(InputKind::Image)
    } else {
        Err(ExtractError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        })
    }
}

/// Resolve the input string to a local file.
///
/// URLs are downloaded into `scratch`; local paths must exist, be readable,
/// carry a supported extension and, for PDFs, start with `%PDF`.
pub async fn resolve_input(
    input: &str,
    scratch: &ScratchSpace,
    timeout_secs: u64,
) -> Result<ResolvedInput, ExtractError> {
    let path = if is_url(input) {
        download_url(input, scratch.path(), timeout_secs).await?
    } else {
        PathBuf::from(input)
    };
    resolve_local(path)
}

/// Validate a local file: existence, permission, extension, PDF magic bytes.
pub fn resolve_local(path: PathBuf) -> Result<ResolvedInput, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::InputNotFound { path });
    }

    let kind = detect_kind(&path)?;

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if kind == InputKind::Pdf {
                use std::io::Read;
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
                    return Err(ExtractError::DocumentOpen {
                        path,
                        detail: format!("missing %PDF header (first bytes: {magic:?})"),
                    });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ExtractError::InputNotFound { path });
        }
    }

    debug!("Resolved {:?} input: {}", kind, path.display());
    Ok(ResolvedInput { path, kind })
}

/// Download a URL into `dir` and return the local path.
async fn download_url(url: &str, dir: &Path, timeout_secs: u64) -> Result<PathBuf, ExtractError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let file_path = dir.join(filename_from_url(url));

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ExtractError::Internal(format!("Failed to write downloaded file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());
    Ok(file_path)
}

/// Last path segment of `url` when it looks like a file name, else
/// `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(detect_kind(Path::new("a.pdf")).unwrap(), InputKind::Pdf);
        assert_eq!(detect_kind(Path::new("a.PDF")).unwrap(), InputKind::Pdf);
        for ext in ["png", "jpg", "JPEG", "bmp", "tiff"] {
            let p = PathBuf::from(format!("scan.{ext}"));
            assert_eq!(detect_kind(&p).unwrap(), InputKind::Image, "{ext}");
        }
        assert!(matches!(
            detect_kind(Path::new("a.docx")),
            Err(ExtractError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_kind(Path::new("no_extension")),
            Err(ExtractError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/files/invoice.pdf"),
            "invoice.pdf"
        );
        assert_eq!(filename_from_url("https://example.com/"), "downloaded.pdf");
    }

    #[test]
    fn test_missing_input() {
        let err = resolve_local(PathBuf::from("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::InputNotFound { .. }));
    }

    #[test]
    fn test_unsupported_extension_on_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let err = resolve_local(path).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_pdf_without_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, "this is text").unwrap();
        let err = resolve_local(path).unwrap_err();
        assert!(matches!(err, ExtractError::DocumentOpen { .. }));
    }

    #[test]
    fn test_scratch_space_is_removed_on_drop() {
        let scratch = ScratchSpace::new().unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(path.join("page_0.png"), b"x").unwrap();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_spaces_are_distinct() {
        let a = ScratchSpace::new().unwrap();
        let b = ScratchSpace::new().unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("ocr_process_"));
    }
}
