//! Draws translucent boxes over selected paragraphs.
//!
//! Selected paragraphs are grouped by owning document in first-seen order
//! and each group yields one annotated copy. For every page that holds a
//! selected paragraph the page gets:
//!
//! - an `ExtGState` resource setting stroke and fill alpha,
//! - a `q` stream in front of its existing content and a stream after it
//!   that starts with `Q`, so state left behind by the original content
//!   cannot leak into the highlight,
//! - one closed rectangle per selected paragraph on that page.
//!
//! Lookup is by paragraph index, so duplicate paragraph text is never
//! ambiguous.

use docent_core::models::{Coordinates, DocumentFormat, ParsedDocument, RankedParagraph};
use docent_core::{Error, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId, Stream};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::HighlightConfig;
use crate::pdf::{self, pdf_error};

/// Resource name of the alpha graphics state added to highlighted pages.
const HIGHLIGHT_STATE: &str = "DocentHighlight";

/// Return one annotated copy per distinct document in `selected`.
pub fn highlight(selected: &[RankedParagraph], config: &HighlightConfig) -> Result<Vec<ParsedDocument>> {
    let mut groups: Vec<(Arc<ParsedDocument>, Vec<usize>)> = Vec::new();
    for ranked in selected {
        let position = groups
            .iter()
            .position(|(doc, _)| doc.name() == ranked.document_name());
        let position = match position {
            Some(i) => i,
            None => {
                groups.push((Arc::clone(&ranked.document), Vec::new()));
                groups.len() - 1
            }
        };
        let indices = &mut groups[position].1;
        if !indices.contains(&ranked.index) {
            indices.push(ranked.index);
        }
    }

    groups
        .into_iter()
        .map(|(doc, indices)| annotate(&doc, &indices, config))
        .collect()
}

fn annotate(doc: &ParsedDocument, indices: &[usize], config: &HighlightConfig) -> Result<ParsedDocument> {
    let rects = indices
        .iter()
        .map(|&index| {
            doc.paragraph(index)
                .map(|p| p.coordinates)
                .ok_or_else(|| Error::ParagraphOutOfRange {
                    document: doc.name().to_string(),
                    index,
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let format = doc.document().format();
    if format != DocumentFormat::Pdf {
        return Err(Error::UnsupportedFormat(format.label().to_string()));
    }

    let bytes = annotate_pdf(doc.content(), &rects, config)?;
    tracing::debug!(
        document = doc.name(),
        rectangles = rects.len(),
        "highlighted document"
    );
    Ok(doc.with_content(bytes))
}

fn annotate_pdf(bytes: &[u8], rects: &[Coordinates], config: &HighlightConfig) -> Result<Vec<u8>> {
    let mut doc = pdf::load(bytes)?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();

    let mut by_page: BTreeMap<usize, Vec<Coordinates>> = BTreeMap::new();
    for rect in rects {
        by_page.entry(rect.page).or_default().push(*rect);
    }

    let mut state = Dictionary::new();
    state.set("Type", Object::Name(b"ExtGState".to_vec()));
    state.set("CA", Object::Real(config.opacity));
    state.set("ca", Object::Real(config.opacity));
    let state_id = doc.add_object(state);

    for (page, page_rects) in by_page {
        let page_id = *pages
            .get(page)
            .ok_or_else(|| Error::Pdf(format!("page {} does not exist", page)))?;
        let media_box = pdf::media_box(&doc, page_id);

        let operations = highlight_operations(&page_rects, media_box, config);
        // Streams are concatenated as is; the leading newline keeps our `Q`
        // from fusing with an operator at the end of the original content.
        let mut encoded = b"\n".to_vec();
        encoded.extend(Content { operations }.encode().map_err(pdf_error)?);
        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let highlight_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        install_state(&mut doc, page_id, state_id)?;
        wrap_contents(&mut doc, page_id, save_id, highlight_id)?;
    }

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| Error::Pdf(e.to_string()))?;
    Ok(out)
}

/// Drawing operations for one page, in PDF user space.
fn highlight_operations(rects: &[Coordinates], media_box: [f32; 4], config: &HighlightConfig) -> Vec<Operation> {
    let [llx, _, _, ury] = media_box;
    let [sr, sg, sb] = config.stroke_color;
    let [fr, fg, fb] = config.fill_color;

    let mut ops = vec![
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(HIGHLIGHT_STATE.as_bytes().to_vec())]),
        Operation::new("RG", vec![Object::Real(sr), Object::Real(sg), Object::Real(sb)]),
        Operation::new("rg", vec![Object::Real(fr), Object::Real(fg), Object::Real(fb)]),
    ];
    for rect in rects {
        ops.push(Operation::new(
            "re",
            vec![
                Object::Real(rect.left + llx),
                Object::Real(ury - rect.bottom),
                Object::Real(rect.width()),
                Object::Real(rect.height()),
            ],
        ));
        ops.push(Operation::new("B", vec![]));
    }
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Register the alpha state in the page's own resource dictionary.
///
/// Inherited resources are copied down first so the page keeps its fonts.
fn install_state(doc: &mut lopdf::Document, page_id: ObjectId, state_id: ObjectId) -> Result<()> {
    let mut resources = match pdf::inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    let mut states = match resources
        .get(b"ExtGState")
        .ok()
        .and_then(|obj| pdf::resolve(doc, obj))
    {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    states.set(HIGHLIGHT_STATE, Object::Reference(state_id));
    resources.set("ExtGState", Object::Dictionary(states));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(pdf_error)?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn wrap_contents(
    doc: &mut lopdf::Document,
    page_id: ObjectId,
    save_id: ObjectId,
    highlight_id: ObjectId,
) -> Result<()> {
    let page = doc.get_dictionary(page_id).map_err(pdf_error)?;
    let existing = match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(highlight_id));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(pdf_error)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::models::Document;

    fn coords(page: usize) -> Coordinates {
        Coordinates {
            left: 72.0,
            top: 100.0,
            right: 300.0,
            bottom: 130.0,
            page,
        }
    }

    #[test]
    fn rectangles_are_flipped_to_pdf_space() {
        let ops = highlight_operations(&[coords(0)], [0.0, 0.0, 612.0, 792.0], &HighlightConfig::default());
        let re = ops.iter().find(|op| op.operator == "re").unwrap();
        let values: Vec<f32> = re.operands.iter().filter_map(pdf::number).collect();
        assert_eq!(values, vec![72.0, 662.0, 228.0, 30.0]);
        assert_eq!(ops.first().unwrap().operator, "Q");
        assert_eq!(ops.last().unwrap().operator, "Q");
        assert_eq!(ops.iter().filter(|op| op.operator == "B").count(), 1);
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let doc = Arc::new(ParsedDocument::new(
            Document::new("a.pdf", Vec::new()),
            vec![("only".to_string(), coords(0))],
        ));
        let selected = vec![RankedParagraph {
            document: doc,
            index: 3,
            score: 0.9,
        }];
        let err = highlight(&selected, &HighlightConfig::default()).unwrap_err();
        assert!(matches!(err, Error::ParagraphOutOfRange { index: 3, .. }));
    }

    #[test]
    fn empty_selection_yields_nothing() {
        assert!(highlight(&[], &HighlightConfig::default()).unwrap().is_empty());
    }
}
