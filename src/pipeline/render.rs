//! Page rasterisation: turn PDF pages into image files for OCR.
//!
//! Two strategies sit behind [`PageRasterizer`]:
//!
//! * [`PageRasterizer::rasterize_page`] re-renders a whole page at a zoom
//!   factor (default 2×). Right for full-page scans.
//! * [`PageRasterizer::extract_page_images`] pulls the raster objects
//!   already embedded in a page at their native resolution. Right for
//!   documents that are a handful of embedded photos.
//!
//! Both work one page at a time and write straight into the run's scratch
//! directory, so a multi-hundred-page scan never has more than the pages in
//! flight held in memory.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and is not safe to call
//! from async contexts. The orchestrator drives every rasterizer call from
//! `tokio::task::spawn_blocking`, which is also why the trait is synchronous.

use crate::error::{ExtractError, PageError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A raster image on disk, ready for OCR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterImage {
    /// 0-based page the image came from.
    pub page_index: usize,
    /// 0-based occurrence index within the page for embedded images;
    /// `None` for full-page renders and raster inputs.
    pub image_index: Option<usize>,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Produces page images from a PDF on disk.
pub trait PageRasterizer: Send + Sync {
    /// Render page `page_index` at `zoom`× its native size into `out_dir`.
    /// The image is `width × zoom` by `height × zoom` pixels.
    fn rasterize_page(
        &self,
        pdf_path: &Path,
        page_index: usize,
        zoom: f32,
        out_dir: &Path,
    ) -> Result<RasterImage, PageError>;

    /// Save every raster object embedded in page `page_index` into
    /// `out_dir`, in occurrence order, without re-rendering.
    fn extract_page_images(
        &self,
        pdf_path: &Path,
        page_index: usize,
        out_dir: &Path,
    ) -> Result<Vec<RasterImage>, PageError>;
}

/// Extract every embedded image of a `page_count`-page document: page order,
/// then in-page occurrence order. Pages that fail are reported alongside
/// rather than aborting the walk.
///
/// This is the batch form for library callers that want all images up
/// front. The pipeline itself calls [`PageRasterizer::extract_page_images`]
/// one page at a time so only one page's images sit in scratch space at once.
pub fn extract_embedded_images(
    rasterizer: &dyn PageRasterizer,
    pdf_path: &Path,
    page_count: usize,
    out_dir: &Path,
) -> (Vec<RasterImage>, Vec<PageError>) {
    let mut images = Vec::new();
    let mut errors = Vec::new();
    for page_index in 0..page_count {
        match rasterizer.extract_page_images(pdf_path, page_index, out_dir) {
            Ok(found) => images.extend(found),
            Err(e) => errors.push(e),
        }
    }
    (images, errors)
}

/// File name for a full-page render: `page_{index}.png`.
pub fn page_image_name(page_index: usize) -> String {
    format!("page_{page_index}.png")
}

/// File name for an embedded image: `page_{p}_img_{i}.png`, both 1-based.
pub fn embedded_image_name(page_index: usize, image_index: usize) -> String {
    format!("page_{}_img_{}.png", page_index + 1, image_index + 1)
}

/// Save `image` as PNG and describe it as a [`RasterImage`].
pub fn save_raster(
    image: &DynamicImage,
    path: PathBuf,
    page_index: usize,
    image_index: Option<usize>,
) -> Result<RasterImage, PageError> {
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .map_err(|e| PageError::RasterFailed {
            page: page_index,
            detail: format!("cannot write {}: {}", path.display(), e),
        })?;
    Ok(RasterImage {
        page_index,
        image_index,
        path,
        width: image.width(),
        height: image.height(),
    })
}

// ── pdfium backend ───────────────────────────────────────────────────────────

/// [`PageRasterizer`] backed by pdfium.
///
/// The library is bound on each call rather than once per process so that no
/// binding outlives the run that needed it.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Look for pdfium next to the current directory, then system-wide.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the pdfium library at `path` (a file, or a directory holding
    /// the platform library).
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    /// Check that pdfium can be bound at all.
    pub fn check_binding(&self) -> Result<(), ExtractError> {
        self.bind().map(|_| ())
    }

    fn bind(&self) -> Result<Pdfium, ExtractError> {
        let bindings = match &self.library_path {
            Some(path) if path.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            }
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }

    fn bind_for_page(&self, page_index: usize) -> Result<Pdfium, PageError> {
        self.bind().map_err(|e| PageError::RasterFailed {
            page: page_index,
            detail: e.to_string(),
        })
    }
}

fn raster_error(page_index: usize, what: &str, e: impl std::fmt::Debug) -> PageError {
    PageError::RasterFailed {
        page: page_index,
        detail: format!("{what}: {e:?}"),
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize_page(
        &self,
        pdf_path: &Path,
        page_index: usize,
        zoom: f32,
        out_dir: &Path,
    ) -> Result<RasterImage, PageError> {
        let pdfium = self.bind_for_page(page_index)?;
        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| raster_error(page_index, "load", e))?;
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(|e| raster_error(page_index, "page", e))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(zoom);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| raster_error(page_index, "render", e))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} at {}× → {}x{} px",
            page_index,
            zoom,
            image.width(),
            image.height()
        );

        save_raster(
            &image,
            out_dir.join(page_image_name(page_index)),
            page_index,
            None,
        )
    }

    fn extract_page_images(
        &self,
        pdf_path: &Path,
        page_index: usize,
        out_dir: &Path,
    ) -> Result<Vec<RasterImage>, PageError> {
        let pdfium = self.bind_for_page(page_index)?;
        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| raster_error(page_index, "load", e))?;
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(|e| raster_error(page_index, "page", e))?;

        let mut images = Vec::new();
        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let image_index = images.len();
            let raw = image_object
                .get_raw_image()
                .map_err(|e| raster_error(page_index, "embedded image", e))?;
            images.push(save_raster(
                &raw,
                out_dir.join(embedded_image_name(page_index, image_index)),
                page_index,
                Some(image_index),
            )?);
        }

        debug!(
            "Page {}: extracted {} embedded images",
            page_index,
            images.len()
        );
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn image_names_are_stable() {
        assert_eq!(page_image_name(0), "page_0.png");
        assert_eq!(embedded_image_name(0, 0), "page_1_img_1.png");
        assert_eq!(embedded_image_name(2, 4), "page_3_img_5.png");
    }

    #[test]
    fn save_raster_records_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(12, 7, Rgba([255, 255, 255, 255])));
        let saved = save_raster(&img, dir.path().join("x.png"), 3, Some(1)).unwrap();
        assert_eq!((saved.width, saved.height), (12, 7));
        assert_eq!(saved.page_index, 3);
        assert_eq!(saved.image_index, Some(1));
        assert!(saved.path.exists());
    }

    #[test]
    fn save_raster_into_missing_dir_is_page_error() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(1, 1));
        let err = save_raster(&img, PathBuf::from("/no/such/dir/x.png"), 5, None).unwrap_err();
        assert_eq!(err.page(), 5);
    }

    struct ListRasterizer;

    impl PageRasterizer for ListRasterizer {
        fn rasterize_page(
            &self,
            _: &Path,
            page_index: usize,
            _: f32,
            _: &Path,
        ) -> Result<RasterImage, PageError> {
            Err(PageError::RasterFailed {
                page: page_index,
                detail: "unused".into(),
            })
        }

        fn extract_page_images(
            &self,
            _: &Path,
            page_index: usize,
            out_dir: &Path,
        ) -> Result<Vec<RasterImage>, PageError> {
            if page_index == 1 {
                return Err(PageError::RasterFailed {
                    page: 1,
                    detail: "corrupt".into(),
                });
            }
            Ok((0..2)
                .map(|i| RasterImage {
                    page_index,
                    image_index: Some(i),
                    path: out_dir.join(embedded_image_name(page_index, i)),
                    width: 1,
                    height: 1,
                })
                .collect())
        }
    }

    #[test]
    fn embedded_images_keep_page_then_occurrence_order() {
        let (images, errors) =
            extract_embedded_images(&ListRasterizer, Path::new("x.pdf"), 3, Path::new("/tmp"));
        let order: Vec<(usize, Option<usize>)> = images
            .iter()
            .map(|i| (i.page_index, i.image_index))
            .collect();
        assert_eq!(
            order,
            vec![(0, Some(0)), (0, Some(1)), (2, Some(0)), (2, Some(1))]
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].page(), 1);
    }
}
