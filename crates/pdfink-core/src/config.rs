//! Render configuration

use serde::{Deserialize, Serialize};

use crate::geometry::DEFAULT_PREVIEW_ZOOM;

/// What to do with an annotation that cannot be drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Fail the whole render on the first invalid record
    #[default]
    Abort,
    /// Leave the record out, log it, and render the rest
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub fault_policy: FaultPolicy,
    /// Flate-compress freehand drawing samples
    pub compress_images: bool,
    /// Zoom clients render previews at; used to size preview canvases
    pub preview_zoom: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            fault_policy: FaultPolicy::Abort,
            compress_images: true,
            preview_zoom: DEFAULT_PREVIEW_ZOOM,
        }
    }
}
