//! Geometry & font estimation: map recognizer pixel boxes onto page space.
//!
//! Recognizers report boxes in image convention (top-left origin, y grows
//! downward). PDF pages use a bottom-left origin with y growing upward, so
//! every box must be flipped against the page height before it is drawn.

use serde::{Deserialize, Serialize};

/// A point in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned quadrilateral in image pixel space, corners listed clockwise
/// from the top-left: `[top_left, top_right, bottom_right, bottom_left]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub points: [Point; 4],
}

impl BoundingBox {
    pub fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// Build a box from its top-left corner and extent.
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            points: [
                Point::new(x, y),
                Point::new(x + width, y),
                Point::new(x + width, y + height),
                Point::new(x, y + height),
            ],
        }
    }

    pub fn top_left(&self) -> Point {
        self.points[0]
    }

    pub fn bottom_left(&self) -> Point {
        self.points[3]
    }

    /// Vertical extent measured along the left edge.
    pub fn height(&self) -> f32 {
        (self.bottom_left().y - self.top_left().y).abs()
    }
}

/// Tuning for [`font_size`]. Both values are overridable per run through
/// [`crate::config::ExtractionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontMetrics {
    /// Floor applied to every estimate. Default: 8.
    pub min_font_size: f32,
    /// Pixel glyph height divided by this gives the point size. Default: 1.5.
    pub height_divisor: f32,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            min_font_size: 8.0,
            height_divisor: 1.5,
        }
    }
}

/// Estimate the font size for text recognized inside `bbox`:
/// `max(min_font_size, round(box_height / height_divisor))`.
pub fn font_size(bbox: &BoundingBox, metrics: &FontMetrics) -> f32 {
    let estimate = (bbox.height() / metrics.height_divisor).round();
    estimate.max(metrics.min_font_size)
}

/// Convert the top-left corner of `bbox` from image coordinates to page
/// coordinates: `(x, page_height - y)`.
pub fn coordinate_transform(bbox: &BoundingBox, page_height: f32) -> (f32, f32) {
    let tl = bbox.top_left();
    (tl.x, page_height - tl.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_size_from_box_height() {
        let bbox = BoundingBox::new([
            Point::new(10.0, 20.0),
            Point::new(110.0, 20.0),
            Point::new(110.0, 50.0),
            Point::new(10.0, 50.0),
        ]);
        assert_eq!(bbox.height(), 30.0);
        assert_eq!(font_size(&bbox, &FontMetrics::default()), 20.0);
    }

    #[test]
    fn font_size_never_below_floor() {
        let metrics = FontMetrics::default();
        for h in [0.0, 1.0, 5.0, 11.9, 12.0] {
            let bbox = BoundingBox::from_rect(0.0, 0.0, 40.0, h);
            assert!(font_size(&bbox, &metrics) >= 8.0, "height {h}");
        }
    }

    #[test]
    fn font_size_monotonic_in_height() {
        let metrics = FontMetrics::default();
        let mut previous = 0.0;
        for step in 0..400 {
            let h = step as f32 * 0.5;
            let size = font_size(&BoundingBox::from_rect(0.0, 0.0, 10.0, h), &metrics);
            assert!(size >= previous, "height {h}: {size} < {previous}");
            previous = size;
        }
    }

    #[test]
    fn inverted_box_uses_absolute_height() {
        let bbox = BoundingBox::new([
            Point::new(0.0, 50.0),
            Point::new(10.0, 50.0),
            Point::new(10.0, 20.0),
            Point::new(0.0, 20.0),
        ]);
        assert_eq!(bbox.height(), 30.0);
    }

    #[test]
    fn custom_metrics_are_honoured() {
        let metrics = FontMetrics {
            min_font_size: 4.0,
            height_divisor: 2.0,
        };
        let bbox = BoundingBox::from_rect(0.0, 0.0, 10.0, 10.0);
        assert_eq!(font_size(&bbox, &metrics), 5.0);
    }

    #[test]
    fn transform_flips_y_axis() {
        let bbox = BoundingBox::from_rect(10.0, 20.0, 50.0, 30.0);
        assert_eq!(coordinate_transform(&bbox, 200.0), (10.0, 180.0));
    }

    #[test]
    fn transform_round_trips_with_same_height() {
        let h = 842.0;
        for y in [0.0_f32, 12.5, 421.0, 841.9] {
            let bbox = BoundingBox::from_rect(3.0, y, 1.0, 1.0);
            let (x1, y1) = coordinate_transform(&bbox, h);
            let back = BoundingBox::from_rect(x1, y1, 1.0, 1.0);
            let (x2, y2) = coordinate_transform(&back, h);
            assert_eq!(x2, 3.0);
            assert!((y2 - y).abs() < 1e-3, "y={y} came back as {y2}");
        }
    }
}
