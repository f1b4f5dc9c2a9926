//! Page geometry of a source PDF

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::PdfInkError;
use crate::geometry::PageBox;

/// Limit on Parent hops, so a cyclic page tree cannot loop forever
const MAX_TREE_DEPTH: usize = 32;

/// Geometry of one page as reported to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageInfo {
    /// 0-based page index
    pub index: u32,
    pub width_pt: f64,
    pub height_pt: f64,
    /// Size a preview rendered at the requested zoom will have
    pub preview_width_px: u32,
    pub preview_height_px: u32,
}

pub(crate) fn load_document(bytes: &[u8]) -> Result<Document, PdfInkError> {
    Document::load_mem(bytes).map_err(|e| PdfInkError::MalformedInput(e.to_string()))
}

/// Page ids in page order
pub(crate) fn page_ids(doc: &Document) -> Vec<ObjectId> {
    // get_pages is keyed by 1-based page number, so values come out in order
    doc.get_pages().into_values().collect()
}

/// Describe every page of a PDF
pub fn inspect(bytes: &[u8], zoom: f64) -> Result<Vec<PageInfo>, PdfInkError> {
    let doc = load_document(bytes)?;
    Ok(page_ids(&doc)
        .into_iter()
        .enumerate()
        .map(|(index, page_id)| {
            let page = page_box(&doc, page_id);
            let (preview_width_px, preview_height_px) = page.preview_size(zoom);
            PageInfo {
                index: index as u32,
                width_pt: page.width,
                height_pt: page.height,
                preview_width_px,
                preview_height_px,
            }
        })
        .collect())
}

/// Resolve a page's MediaBox, walking up the page tree for inherited values
pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        if depth == MAX_TREE_DEPTH {
            break;
        }
        depth += 1;

        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Some(media_box) = media_box(doc, dict) {
            return media_box;
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => Some(*parent),
            _ => None,
        };
    }
    PageBox::letter()
}

fn media_box(doc: &Document, dict: &Dictionary) -> Option<PageBox> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let Object::Array(arr) = resolved else {
        return None;
    };
    if arr.len() != 4 {
        return None;
    }
    let llx = number(doc, &arr[0])?;
    let lly = number(doc, &arr[1])?;
    let urx = number(doc, &arr[2])?;
    let ury = number(doc, &arr[3])?;
    Some(PageBox::from_corners(llx, lly, urx, ury))
}

pub(crate) fn number(doc: &Document, obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(f) => Some(*f as f64),
            _ => None,
        },
        _ => None,
    }
}
