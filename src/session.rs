//! One user's working set: documents, their annotated copies, and the cache.
//!
//! Nothing here is shared between sessions. A session is mutated through
//! `&mut` only; callers that share one across tasks wrap it in a lock.

use docent_core::cache::SessionCache;
use docent_core::models::ParsedDocument;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Session {
    documents: Vec<Arc<ParsedDocument>>,
    annotations: HashMap<String, ParsedDocument>,
    cache: SessionCache,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parsed document, replacing any document with the same name.
    ///
    /// A replacement keeps the original position and drops the old
    /// document's annotation, embeddings and the session's cached answers.
    /// Returns `true` when a document was replaced.
    pub fn add_document(&mut self, document: ParsedDocument) -> bool {
        let name = document.name().to_string();
        let document = Arc::new(document);
        match self.documents.iter().position(|d| d.name() == name) {
            Some(i) => {
                self.documents[i] = document;
                self.annotations.remove(&name);
                self.cache.invalidate_document(&name);
                true
            }
            None => {
                self.documents.push(document);
                false
            }
        }
    }

    pub fn documents(&self) -> &[Arc<ParsedDocument>] {
        &self.documents
    }

    pub fn document(&self, name: &str) -> Option<&Arc<ParsedDocument>> {
        self.documents.iter().find(|d| d.name() == name)
    }

    /// Names in upload order.
    pub fn document_names(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.name()).collect()
    }

    /// Replace all annotations with `annotated`.
    pub fn set_annotations(&mut self, annotated: Vec<ParsedDocument>) {
        self.annotations = annotated
            .into_iter()
            .map(|doc| (doc.name().to_string(), doc))
            .collect();
    }

    pub fn annotation(&self, name: &str) -> Option<&ParsedDocument> {
        self.annotations.get(name)
    }

    /// Bytes to show for `name`: the annotated copy if one exists, else the original.
    pub fn display_bytes(&self, name: &str) -> Option<&[u8]> {
        self.annotations
            .get(name)
            .map(|doc| doc.content())
            .or_else(|| self.document(name).map(|doc| doc.content()))
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut SessionCache {
        &mut self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::models::{Coordinates, Document};

    fn parsed(name: &str, bytes: &[u8]) -> ParsedDocument {
        let coords = Coordinates {
            left: 0.0,
            top: 0.0,
            right: 10.0,
            bottom: 10.0,
            page: 0,
        };
        ParsedDocument::new(
            Document::new(name, bytes.to_vec()),
            vec![("text".to_string(), coords)],
        )
    }

    #[test]
    fn replacing_keeps_position_and_drops_annotation() {
        let mut session = Session::new();
        assert!(!session.add_document(parsed("a.pdf", b"a1")));
        assert!(!session.add_document(parsed("b.pdf", b"b1")));

        let annotated = session.documents()[0].with_content(b"a1-annotated".to_vec());
        session.set_annotations(vec![annotated]);
        assert_eq!(session.display_bytes("a.pdf"), Some(&b"a1-annotated"[..]));

        assert!(session.add_document(parsed("a.pdf", b"a2")));
        assert_eq!(session.document_names(), vec!["a.pdf", "b.pdf"]);
        assert!(session.annotation("a.pdf").is_none());
        assert_eq!(session.display_bytes("a.pdf"), Some(&b"a2"[..]));
    }

    #[test]
    fn set_annotations_clears_previous_ones() {
        let mut session = Session::new();
        session.add_document(parsed("a.pdf", b"a"));
        session.add_document(parsed("b.pdf", b"b"));
        let first = session.documents()[0].with_content(b"x".to_vec());
        session.set_annotations(vec![first]);
        let second = session.documents()[1].with_content(b"y".to_vec());
        session.set_annotations(vec![second]);

        assert!(session.annotation("a.pdf").is_none());
        assert_eq!(session.display_bytes("a.pdf"), Some(&b"a"[..]));
        assert_eq!(session.display_bytes("b.pdf"), Some(&b"y"[..]));
        assert_eq!(session.display_bytes("missing.pdf"), None);
    }
}
