//! Coordinate conversion between the client canvas and PDF point space
//!
//! The client works top-left origin, Y down. PDF pages are bottom-left origin,
//! Y up:
//! ```text
//! pdf_y = page_height - ui_y
//! ```

use serde::{Deserialize, Serialize};

/// Zoom the preview is rendered at when the client does not say otherwise
pub const DEFAULT_PREVIEW_ZOOM: f64 = 2.0;

/// A page's visible box in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    /// Lower-left corner of the MediaBox
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageBox {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            width,
            height,
        }
    }

    /// US Letter, used when a page tree carries no MediaBox at all
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// Build from MediaBox corners, normalizing swapped corners
    pub fn from_corners(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self {
            origin_x: llx.min(urx),
            origin_y: lly.min(ury),
            width: (urx - llx).abs(),
            height: (ury - lly).abs(),
        }
    }

    /// Flip a top-left Y coordinate into page-relative PDF space
    pub fn flip_y(&self, y: f64) -> f64 {
        self.height - y
    }

    /// Convert a top-left point into page-relative PDF space
    pub fn to_pdf(&self, x: f64, y: f64) -> (f64, f64) {
        (x, self.flip_y(y))
    }

    /// Convert a top-left rectangle (y measured to its top edge, extending
    /// down) into a PDF rectangle given by its lower-left corner
    pub fn rect_to_pdf(&self, x: f64, y: f64, width: f64, height: f64) -> (f64, f64, f64, f64) {
        (x, self.flip_y(y + height), width, height)
    }

    /// Whether the MediaBox starts somewhere other than (0, 0)
    pub fn has_offset(&self) -> bool {
        self.origin_x != 0.0 || self.origin_y != 0.0
    }

    /// Pixel size of a preview rendered at `zoom`
    pub fn preview_size(&self, zoom: f64) -> (u32, u32) {
        (
            (self.width * zoom).round().max(0.0) as u32,
            (self.height * zoom).round().max(0.0) as u32,
        )
    }
}

/// Maps preview pixels back to points for a preview rendered at `zoom`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewScale {
    pub zoom: f64,
}

impl PreviewScale {
    pub fn new(zoom: f64) -> Self {
        Self { zoom }
    }

    pub fn to_points(&self, px: f64) -> f64 {
        px / self.zoom
    }

    pub fn point_from_pixels(&self, x_px: f64, y_px: f64) -> (f64, f64) {
        (self.to_points(x_px), self.to_points(y_px))
    }
}

impl Default for PreviewScale {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_ZOOM)
    }
}
