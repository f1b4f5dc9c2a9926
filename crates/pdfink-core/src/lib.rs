//! PDF annotation overlay compositor
//!
//! This crate flattens client-placed annotations (text, lines, rectangles,
//! circles and a freehand drawing layer) onto the pages of an existing PDF
//! using lopdf.
//!
//! - [`EditSession`]: holds one uploaded PDF and its annotation list
//! - [`Compositor`] / [`render`]: draws an annotation list onto PDF bytes
//! - [`inspect`]: page geometry for sizing client previews

pub mod annotation;
pub mod color;
pub mod command;
pub mod compositor;
pub mod config;
pub mod encoding;
pub mod error;
pub mod font;
pub mod geometry;
pub mod image;
pub mod overlay;
pub mod page;
pub mod session;

pub use annotation::{Annotation, AnnotationList, PixelFormat};
pub use color::Rgb;
pub use command::{ExportCommand, ProcessMetrics, ProcessResult};
pub use compositor::{render, Compositor, RenderReport};
pub use config::{FaultPolicy, RenderOptions};
pub use error::PdfInkError;
pub use font::StandardFont;
pub use geometry::{PageBox, PreviewScale};
pub use image::RgbaBitmap;
pub use page::{inspect, PageInfo};
pub use session::{EditSession, ExportedPdf, EXPORT_FILE_NAME, EXPORT_MIME_TYPE};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfInkError> {
    let doc = page::load_document(bytes)?;
    Ok(doc.get_pages().len() as u32)
}
