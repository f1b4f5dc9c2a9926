//! Flatten annotation overlays onto PDF pages

use std::collections::BTreeMap;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

use crate::annotation::{Annotation, AnnotationList};
use crate::config::{FaultPolicy, RenderOptions};
use crate::error::PdfInkError;
use crate::overlay::{Overlay, OverlayCanvas};
use crate::page::{load_document, page_box, page_ids};

/// Resource categories an overlay adds entries to
const OVERLAY_CATEGORIES: [&[u8]; 3] = [b"Font", b"ExtGState", b"XObject"];

/// Limit on Parent hops when looking for inherited resources
const MAX_TREE_DEPTH: usize = 32;

/// Output of a render plus what happened to each record
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub pdf: Vec<u8>,
    pub page_count: u32,
    pub pages_annotated: u32,
    pub drawn: usize,
    /// Invalid records left out under [`FaultPolicy::Skip`]
    pub skipped: usize,
    /// Records targeting a page the document does not have
    pub off_document: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Compositor {
    options: RenderOptions,
}

impl Compositor {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `annotations` onto `pdf_bytes` and return the new PDF
    pub fn render(
        &self,
        pdf_bytes: &[u8],
        annotations: &AnnotationList,
    ) -> Result<Vec<u8>, PdfInkError> {
        self.render_with_report(pdf_bytes, annotations)
            .map(|report| report.pdf)
    }

    /// Render and report per-record outcomes.
    ///
    /// The algorithm:
    /// 1. Parse the source; a document that does not parse fails the render
    /// 2. Partition records by page, keeping insertion order within a page
    /// 3. For each annotated page, draw its records onto an overlay canvas
    /// 4. Flatten each overlay on top of the page's original content
    /// 5. Serialize, or hand back the source untouched if no page changed
    pub fn render_with_report(
        &self,
        pdf_bytes: &[u8],
        annotations: &AnnotationList,
    ) -> Result<RenderReport, PdfInkError> {
        let mut doc = load_document(pdf_bytes)?;
        let pages = page_ids(&doc);
        let page_count = pages.len() as u32;

        let mut by_page: BTreeMap<u32, Vec<(usize, &Annotation)>> = BTreeMap::new();
        let mut off_document = 0;
        for (index, annotation) in annotations.annotations().iter().enumerate() {
            let page = annotation.page();
            if page < page_count {
                by_page.entry(page).or_default().push((index, annotation));
            } else {
                debug!(
                    index,
                    page,
                    page_count,
                    "Annotation targets a missing page, ignoring"
                );
                off_document += 1;
            }
        }

        let mut drawn = 0;
        let mut skipped = 0;
        let mut pages_annotated = 0;
        // Lowest-indexed invalid record under Abort; pages are visited in
        // page order, so a later page may still hold an earlier record
        let mut first_fault: Option<(usize, String)> = None;

        for (page, records) in &by_page {
            let page_id = pages[*page as usize];
            let resources = effective_resources(&doc, page_id);
            let prefix = unused_prefix(&resources);
            let mut canvas = OverlayCanvas::new(page_box(&doc, page_id), &prefix);

            for (index, annotation) in records {
                if matches!(&first_fault, Some((first, _)) if index > first) {
                    break;
                }
                match canvas.draw(annotation) {
                    Ok(()) => drawn += 1,
                    Err(reason) => match self.options.fault_policy {
                        FaultPolicy::Abort => {
                            first_fault = Some((*index, reason));
                            break;
                        }
                        FaultPolicy::Skip => {
                            warn!(
                                index,
                                page,
                                kind = annotation.kind(),
                                %reason,
                                "Skipping invalid annotation"
                            );
                            skipped += 1;
                        }
                    },
                }
            }

            if first_fault.is_some() || canvas.is_empty() {
                continue;
            }

            debug!(page, records = canvas.len(), prefix = %prefix, "Flattening overlay");
            flatten_overlay(
                &mut doc,
                page_id,
                resources,
                canvas.finish(),
                self.options.compress_images,
            )?;
            pages_annotated += 1;
        }

        if let Some((index, reason)) = first_fault {
            return Err(PdfInkError::invalid_record(index, reason));
        }

        let pdf = if pages_annotated == 0 {
            pdf_bytes.to_vec()
        } else {
            let mut output = Vec::new();
            doc.save_to(&mut output)
                .map_err(|e| PdfInkError::OperationError(e.to_string()))?;
            output
        };

        info!(
            page_count,
            pages_annotated,
            drawn,
            skipped,
            off_document,
            output_bytes = pdf.len(),
            "Rendered annotations"
        );

        Ok(RenderReport {
            pdf,
            page_count,
            pages_annotated,
            drawn,
            skipped,
            off_document,
        })
    }
}

/// Render with default options
pub fn render(pdf_bytes: &[u8], annotations: &AnnotationList) -> Result<Vec<u8>, PdfInkError> {
    Compositor::default().render(pdf_bytes, annotations)
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        _ => None,
    }
}

/// Page-private copy of the resources a page uses.
///
/// Resources may be inherited from the page tree or shared with other pages
/// by reference, so the copy is taken by value and the categories an overlay
/// writes to are inlined. Writing the overlay into the copy never touches
/// another page.
fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        if depth == MAX_TREE_DEPTH {
            break;
        }
        depth += 1;

        let Ok(node) = doc.get_dictionary(id) else {
            break;
        };
        if let Some(resources) = node
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve_dict(doc, obj))
        {
            let mut resources = resources.clone();
            for category in OVERLAY_CATEGORIES {
                let inlined = resources
                    .get(category)
                    .ok()
                    .and_then(|obj| resolve_dict(doc, obj))
                    .cloned();
                if let Some(inlined) = inlined {
                    resources.set(category.to_vec(), Object::Dictionary(inlined));
                }
            }
            return resources;
        }
        current = match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => Some(*parent),
            _ => None,
        };
    }
    Dictionary::new()
}

/// First of "Ink", "Ink2", "Ink3", ... that no existing resource name starts with
fn unused_prefix(resources: &Dictionary) -> String {
    let existing: Vec<&[u8]> = OVERLAY_CATEGORIES
        .iter()
        .filter_map(|category| resources.get(category).ok())
        .filter_map(|obj| obj.as_dict().ok())
        .flat_map(|dict| dict.iter().map(|(key, _)| key.as_slice()))
        .collect();

    let mut n = 1;
    loop {
        let prefix = if n == 1 {
            "Ink".to_string()
        } else {
            format!("Ink{}", n)
        };
        if !existing.iter().any(|key| key.starts_with(prefix.as_bytes())) {
            return prefix;
        }
        n += 1;
    }
}

fn category_mut<'a>(
    resources: &'a mut Dictionary,
    category: &[u8],
) -> Result<&'a mut Dictionary, PdfInkError> {
    if !matches!(resources.get(category), Ok(Object::Dictionary(_))) {
        resources.set(category.to_vec(), Object::Dictionary(Dictionary::new()));
    }
    match resources.get_mut(category) {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        _ => Err(PdfInkError::OperationError(format!(
            "Resource category {} is not a dictionary",
            String::from_utf8_lossy(category)
        ))),
    }
}

/// The page's content streams, as references in paint order
fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, PdfInkError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| PdfInkError::OperationError(e.to_string()))?;
    Ok(match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(streams)) => streams.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(streams)) => streams.clone(),
        _ => Vec::new(),
    })
}

/// Paint `overlay` on top of the page's existing content.
///
/// The original content is bracketed by `q`/`Q` so whatever graphics state it
/// leaves behind (transforms, clipping, colors) cannot reach the overlay.
fn flatten_overlay(
    doc: &mut Document,
    page_id: ObjectId,
    mut resources: Dictionary,
    overlay: Overlay,
    compress_images: bool,
) -> Result<(), PdfInkError> {
    for (name, font) in &overlay.fonts {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        category_mut(&mut resources, b"Font")?.set(name.as_bytes().to_vec(), font_id);
    }

    for (name, alpha) in &overlay.alpha_states {
        let state = dictionary! {
            "Type" => "ExtGState",
            "ca" => Object::Real(*alpha as f32),
            "CA" => Object::Real(*alpha as f32),
        };
        category_mut(&mut resources, b"ExtGState")?
            .set(name.as_bytes().to_vec(), Object::Dictionary(state));
    }

    for (name, bitmap) in &overlay.images {
        let image_id = bitmap.add_to_document(doc, compress_images)?;
        category_mut(&mut resources, b"XObject")?.set(name.as_bytes().to_vec(), image_id);
    }

    let overlay_bytes = overlay
        .content
        .encode()
        .map_err(|e| PdfInkError::OperationError(e.to_string()))?;
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay_bytes));

    let existing = existing_contents(doc, page_id)?;
    let contents = if existing.is_empty() {
        vec![Object::Reference(overlay_id)]
    } else {
        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let close_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        let mut contents = Vec::with_capacity(existing.len() + 3);
        contents.push(Object::Reference(open_id));
        contents.extend(existing);
        contents.push(Object::Reference(close_id));
        contents.push(Object::Reference(overlay_id));
        contents
    };

    let page = doc
        .get_object_mut(page_id)
        .and_then(|obj| obj.as_dict_mut())
        .map_err(|e| PdfInkError::OperationError(e.to_string()))?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));
    Ok(())
}
