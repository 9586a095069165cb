//! Opened PDF documents and their pages.
//!
//! lopdf gives us the native text layer and the font resources without a
//! native library, so classification and text extraction never need pdfium.
//! A [`PdfDocument`] is read-only once opened.

use crate::error::ExtractError;
use lopdf::{Document, Object, ObjectId};
use std::path::{Path, PathBuf};

/// US Letter, used when a page carries no usable MediaBox.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// One page of a [`PdfDocument`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    /// 0-based page index.
    pub index: usize,
    /// Width in points.
    pub width: f32,
    /// Height in points.
    pub height: f32,
    pub(crate) id: ObjectId,
}

impl PageInfo {
    /// 1-based page number as used inside the PDF page tree.
    pub fn number(&self) -> u32 {
        self.index as u32 + 1
    }
}

/// A parsed PDF.
pub struct PdfDocument {
    path: PathBuf,
    inner: Document,
    pages: Vec<PageInfo>,
}

impl PdfDocument {
    /// Parse the PDF at `path`.
    ///
    /// # Errors
    /// [`ExtractError::DocumentOpen`] if the file is unreadable or not a PDF.
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let inner = Document::load(path).map_err(|e| ExtractError::DocumentOpen {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(Self::from_document(path.to_path_buf(), inner))
    }

    /// Parse a PDF held in memory. `label` is only used in error messages.
    pub fn from_bytes(bytes: &[u8], label: impl Into<PathBuf>) -> Result<Self, ExtractError> {
        let label = label.into();
        let inner = Document::load_mem(bytes).map_err(|e| ExtractError::DocumentOpen {
            path: label.clone(),
            detail: e.to_string(),
        })?;
        Ok(Self::from_document(label, inner))
    }

    fn from_document(path: PathBuf, inner: Document) -> Self {
        let pages = inner
            .get_pages()
            .into_iter()
            .enumerate()
            .map(|(index, (_number, id))| {
                let (width, height) = page_size(&inner, id);
                PageInfo {
                    index,
                    width,
                    height,
                    id,
                }
            })
            .collect();
        Self { path, inner, pages }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }

    /// Raw native text of one page as lopdf lays it out (one line per text
    /// object).
    pub fn page_text(&self, page: &PageInfo) -> Result<String, lopdf::Error> {
        self.inner.extract_text(&[page.number()])
    }

    /// Whether the page declares any font resources.
    pub fn page_has_fonts(&self, page: &PageInfo) -> bool {
        self.inner
            .get_page_fonts(page.id)
            .map(|fonts| !fonts.is_empty())
            .unwrap_or(false)
    }
}

/// Read `/MediaBox` (inherited through the page tree) as `(width, height)`.
fn page_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let resolved = match media_box {
                Object::Reference(r) => doc.get_object(*r).ok(),
                other => Some(other),
            };
            if let Some(Ok(values)) = resolved.map(|o| o.as_array()) {
                let nums: Vec<f32> = values.iter().filter_map(as_number).collect();
                if nums.len() == 4 {
                    return ((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs());
                }
            }
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok());
    }
    DEFAULT_PAGE_SIZE
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn two_page_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for (w, h) in [(300, 400), (500, 200)] {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {},
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn reads_page_sizes_in_order() {
        let doc = PdfDocument::from_bytes(&two_page_pdf(), "two.pdf").unwrap();
        assert_eq!(doc.page_count(), 2);
        let sizes: Vec<(usize, f32, f32)> = doc
            .pages()
            .iter()
            .map(|p| (p.index, p.width, p.height))
            .collect();
        assert_eq!(sizes, vec![(0, 300.0, 400.0), (1, 500.0, 200.0)]);
        assert_eq!(doc.pages()[1].number(), 2);
    }

    #[test]
    fn pages_without_fonts_report_none() {
        let doc = PdfDocument::from_bytes(&two_page_pdf(), "two.pdf").unwrap();
        assert!(!doc.page_has_fonts(&doc.pages()[0]));
    }

    #[test]
    fn garbage_fails_to_open() {
        let err = PdfDocument::from_bytes(b"not a pdf at all", "junk.pdf")
            .err()
            .expect("should fail");
        assert!(matches!(err, ExtractError::DocumentOpen { .. }));
    }

    #[test]
    fn missing_file_fails_to_open() {
        let err = PdfDocument::open(Path::new("/no/such/file.pdf"))
            .err()
            .expect("should fail");
        assert!(matches!(err, ExtractError::DocumentOpen { .. }));
    }
}
