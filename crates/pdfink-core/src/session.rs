//! Edit session for one uploaded PDF
//!
//! An [`EditSession`] owns the uploaded bytes, the page geometry read from
//! them, the page the client is looking at, and the annotation list. It is
//! a plain value: callers keep one per user/document and nothing is shared
//! between sessions.

use tracing::{debug, info};

use crate::annotation::{Annotation, AnnotationList, PixelFormat};
use crate::compositor::Compositor;
use crate::config::RenderOptions;
use crate::error::PdfInkError;
use crate::geometry::PageBox;
use crate::image::RgbaBitmap;
use crate::page::{load_document, page_box, page_ids};

/// File name every export is offered under
pub const EXPORT_FILE_NAME: &str = "edited_pdf.pdf";
pub const EXPORT_MIME_TYPE: &str = "application/pdf";

/// A rendered PDF ready for download
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedPdf {
    pub bytes: Vec<u8>,
    pub file_name: &'static str,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct EditSession {
    document_bytes: Vec<u8>,
    document_name: String,
    pages: Vec<PageBox>,
    current_page: u32,
    annotations: AnnotationList,
}

impl EditSession {
    /// Start a session on an uploaded PDF
    pub fn new(name: &str, bytes: &[u8]) -> Result<Self, PdfInkError> {
        if bytes.is_empty() {
            return Err(PdfInkError::EmptyInput);
        }
        let doc = load_document(bytes)?;
        let pages: Vec<PageBox> = page_ids(&doc)
            .into_iter()
            .map(|page_id| page_box(&doc, page_id))
            .collect();

        info!(name, page_count = pages.len(), "Opened edit session");

        Ok(Self {
            document_bytes: bytes.to_vec(),
            document_name: name.to_string(),
            pages,
            current_page: 0,
            annotations: AnnotationList::new(),
        })
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }

    pub fn document_bytes(&self) -> &[u8] {
        &self.document_bytes
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Geometry of a page, if it exists
    pub fn page(&self, index: u32) -> Option<&PageBox> {
        self.pages.get(index as usize)
    }

    pub fn pages(&self) -> &[PageBox] {
        &self.pages
    }

    pub fn select_page(&mut self, index: u32) -> Result<(), PdfInkError> {
        if index >= self.page_count() {
            return Err(PdfInkError::InvalidPage {
                page: index,
                page_count: self.page_count(),
            });
        }
        self.current_page = index;
        Ok(())
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Append a record and return its index
    pub fn add(&mut self, annotation: Annotation) -> usize {
        debug!(
            kind = annotation.kind(),
            page = annotation.page(),
            "Adding annotation"
        );
        self.annotations.add(annotation)
    }

    pub fn remove(&mut self, index: usize) -> Option<Annotation> {
        self.annotations.remove(index)
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }

    /// Remove text records only; returns how many were removed
    pub fn clear_text(&mut self) -> usize {
        self.annotations.clear_text()
    }

    pub fn annotations(&self) -> &AnnotationList {
        &self.annotations
    }

    pub fn annotations_for_page(&self, page: u32) -> Vec<(usize, &Annotation)> {
        self.annotations.for_page(page)
    }

    pub fn has_changes(&self) -> bool {
        !self.annotations.is_empty()
    }

    /// Replace the freehand layer of `page` with `bitmap`
    pub fn set_freeform(&mut self, page: u32, bitmap: RgbaBitmap) -> Result<usize, PdfInkError> {
        if page >= self.page_count() {
            return Err(PdfInkError::InvalidPage {
                page,
                page_count: self.page_count(),
            });
        }
        self.annotations.clear_freeform(page);
        Ok(self.annotations.add(Annotation::FreeformImage {
            page,
            pixel_buffer: bitmap.pixels,
            source_width_px: bitmap.width,
            source_height_px: bitmap.height,
            format: PixelFormat::Rgba,
        }))
    }

    /// Replace the freehand layer of `page` with a PNG export of the drawing
    /// canvas
    pub fn set_freeform_png(&mut self, page: u32, png: &[u8]) -> Result<usize, PdfInkError> {
        let bitmap = RgbaBitmap::from_png(png).map_err(PdfInkError::MalformedInput)?;
        self.set_freeform(page, bitmap)
    }

    /// Render the annotations onto the uploaded PDF.
    ///
    /// The session is not modified, so a failed export can be retried after
    /// fixing the offending record.
    pub fn export(&self, options: &RenderOptions) -> Result<ExportedPdf, PdfInkError> {
        let bytes =
            Compositor::new(options.clone()).render(&self.document_bytes, &self.annotations)?;
        Ok(ExportedPdf {
            bytes,
            file_name: EXPORT_FILE_NAME,
            mime_type: EXPORT_MIME_TYPE,
        })
    }
}
