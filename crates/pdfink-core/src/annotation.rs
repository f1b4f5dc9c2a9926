//! Annotation records and the ordered annotation list
//!
//! This module provides the records a client places on a page (text, lines,
//! rectangles, circles and a freehand drawing layer) and the insertion-ordered
//! list they are collected in until export.

use serde::{Deserialize, Serialize};

use crate::encoding::base64_bytes;

fn default_stroke_width() -> f64 {
    1.0
}

fn default_opacity() -> f64 {
    1.0
}

/// How a freehand layer's `pixel_buffer` is encoded
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Raw RGBA8, row-major, top row first
    #[default]
    Rgba,
    /// A PNG file, as a browser canvas exports it
    Png,
}

/// A single annotation targeting one page.
///
/// Coordinates are in points, measured from the page's top-left corner with
/// Y growing downward. Fonts and colors are kept exactly as the client sent
/// them and validated when the record is drawn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Annotation {
    Text {
        page: u32,
        content: String,
        font: String,
        size_pt: f64,
        color: String,
        x: f64,
        y: f64,
    },
    Line {
        page: u32,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: String,
        width_pt: f64,
    },
    Rectangle {
        page: u32,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: String,
        stroke: String,
        #[serde(default = "default_opacity")]
        opacity: f64,
        #[serde(default = "default_stroke_width")]
        stroke_width_pt: f64,
    },
    Circle {
        page: u32,
        center_x: f64,
        center_y: f64,
        radius: f64,
        fill: String,
        stroke: String,
        #[serde(default = "default_opacity")]
        opacity: f64,
        #[serde(default = "default_stroke_width")]
        stroke_width_pt: f64,
    },
    /// Full-page freehand layer, stretched to the page when drawn
    FreeformImage {
        page: u32,
        #[serde(with = "base64_bytes")]
        pixel_buffer: Vec<u8>,
        source_width_px: u32,
        source_height_px: u32,
        #[serde(default)]
        format: PixelFormat,
    },
}

impl Annotation {
    pub fn page(&self) -> u32 {
        match self {
            Annotation::Text { page, .. } => *page,
            Annotation::Line { page, .. } => *page,
            Annotation::Rectangle { page, .. } => *page,
            Annotation::Circle { page, .. } => *page,
            Annotation::FreeformImage { page, .. } => *page,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Annotation::Text { .. } => "Text",
            Annotation::Line { .. } => "Line",
            Annotation::Rectangle { .. } => "Rectangle",
            Annotation::Circle { .. } => "Circle",
            Annotation::FreeformImage { .. } => "FreeformImage",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Annotation::Text { .. })
    }

    /// Short label for listing records in a client
    pub fn summary(&self) -> String {
        match self {
            Annotation::Text { content, .. } => {
                let preview: String = content.chars().take(20).collect();
                if content.chars().count() > 20 {
                    format!("Text: {}...", preview)
                } else {
                    format!("Text: {}", preview)
                }
            }
            Annotation::FreeformImage {
                source_width_px,
                source_height_px,
                ..
            } => format!("Drawing: {}x{} px", source_width_px, source_height_px),
            other => other.kind().to_string(),
        }
    }
}

/// Insertion-ordered annotations for one document.
///
/// Records are appended or removed by index; existing records are never
/// edited in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AnnotationList {
    annotations: Vec<Annotation>,
}

impl AnnotationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its index
    pub fn add(&mut self, annotation: Annotation) -> usize {
        self.annotations.push(annotation);
        self.annotations.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<Annotation> {
        if index < self.annotations.len() {
            Some(self.annotations.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }

    /// Drop every text record, keeping shapes and drawings. Returns how many
    /// were removed.
    pub fn clear_text(&mut self) -> usize {
        let before = self.annotations.len();
        self.annotations.retain(|a| !a.is_text());
        before - self.annotations.len()
    }

    /// Drop the freehand layers of one page
    pub fn clear_freeform(&mut self, page: u32) {
        self.annotations
            .retain(|a| !(matches!(a, Annotation::FreeformImage { .. }) && a.page() == page));
    }

    pub fn get(&self, index: usize) -> Option<&Annotation> {
        self.annotations.get(index)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Records for one page with their list indices, in insertion order
    pub fn for_page(&self, page: u32) -> Vec<(usize, &Annotation)> {
        self.annotations
            .iter()
            .enumerate()
            .filter(|(_, a)| a.page() == page)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<Vec<Annotation>> for AnnotationList {
    fn from(annotations: Vec<Annotation>) -> Self {
        Self { annotations }
    }
}

impl FromIterator<Annotation> for AnnotationList {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        Self {
            annotations: iter.into_iter().collect(),
        }
    }
}
