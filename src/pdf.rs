//! Small `lopdf` helpers shared by the parser and the highlighter.

use docent_core::Error;
use lopdf::{Document as PdfDocument, Object, ObjectId};

/// US Letter, used when a page has no `MediaBox` anywhere in its tree.
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

pub fn pdf_error(err: lopdf::Error) -> Error {
    Error::Pdf(err.to_string())
}

pub fn load(bytes: &[u8]) -> Result<PdfDocument, Error> {
    PdfDocument::load_mem(bytes).map_err(pdf_error)
}

/// Follow a reference to the object it names; other objects are returned as is.
pub fn resolve<'a>(doc: &'a PdfDocument, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up a page attribute, walking up the `Parent` chain for inherited keys.
pub fn inherited<'a>(doc: &'a PdfDocument, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Bounded walk; malformed files can contain parent cycles.
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// The page's `MediaBox` as `[llx, lly, urx, ury]`.
pub fn media_box(doc: &PdfDocument, page_id: ObjectId) -> [f32; 4] {
    let Some(Object::Array(values)) = inherited(doc, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };
    let numbers: Vec<f32> = values
        .iter()
        .filter_map(|v| resolve(doc, v).and_then(number))
        .collect();
    match numbers.as_slice() {
        [x0, y0, x1, y1] => [x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)],
        _ => DEFAULT_MEDIA_BOX,
    }
}

pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}
