//! Pipeline stages for document text extraction.
//!
//! Each submodule implements one step. Stages only depend on stages listed
//! before them; [`crate::extract`] is the only place that composes them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ classify ──┬──▶ text ─────────────────────────────────┐
//! (path/URL)  (lopdf)               └──▶ render ──▶ ocr ──▶ reconstruct ──▶ text ┤
//!                                       (pdfium)  (tesseract) (geometry)        │
//!                                                                   postprocess ◀┘
//! ```
//!
//! 1. [`input`]     - canonicalise the user-supplied path or URL to a local
//!    file of a known kind; own the run's scratch directory
//! 2. [`document`]  - parsed PDF and per-page geometry
//! 3. [`classify`]  - text-based vs image-based verdict
//! 4. [`render`]    - page rasterisation and embedded-image extraction;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 5. [`ocr`]       - the text recognizer boundary
//! 6. [`geometry`]  - font size estimation and coordinate flipping
//! 7. [`reconstruct`] - recognition output to a positioned-text PDF page
//! 8. [`text`]      - native text extraction
//! 9. [`postprocess`] - whitespace cleanup and final line sort

pub mod classify;
pub mod document;
pub mod geometry;
pub mod input;
pub mod ocr;
pub mod postprocess;
pub mod reconstruct;
pub mod render;
pub mod text;
