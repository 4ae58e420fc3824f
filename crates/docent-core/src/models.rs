//! Core data models used throughout docent.
//!
//! A [`Document`] is an immutable named byte blob. Parsing turns it into a
//! [`ParsedDocument`]: the same bytes plus an ordered list of
//! [`Paragraph`]s. Paragraph order is load-bearing: position `i` links a
//! paragraph to its embedding vector and to its location on the page, and
//! every paragraph carries that position as its stable `index`.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// A named document as uploaded. The name is its identity within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    name: String,
    content: Vec<u8>,
    fingerprint: String,
}

impl Document {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        let fingerprint = hex::encode(Sha256::digest(&content));
        Self {
            name: name.into(),
            content,
            fingerprint,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Hex SHA-256 of the content, computed once at construction.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn format(&self) -> DocumentFormat {
        DocumentFormat::from_name(&self.name)
    }
}

/// Document format, derived from the file extension.
///
/// Only [`DocumentFormat::Pdf`] can be parsed; the other variants exist so
/// callers can report exactly what they were given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
    Unknown(String),
}

impl DocumentFormat {
    pub fn from_name(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => String::new(),
        };
        match ext.as_str() {
            "pdf" => DocumentFormat::Pdf,
            "docx" => DocumentFormat::Docx,
            "txt" => DocumentFormat::Txt,
            _ => DocumentFormat::Unknown(ext),
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, DocumentFormat::Pdf)
    }

    pub fn label(&self) -> &str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Unknown(ext) if ext.is_empty() => "(no extension)",
            DocumentFormat::Unknown(ext) => ext,
        }
    }
}

/// Bounding box of a paragraph on its page.
///
/// Origin is the top-left corner of the page, y grows downward, units are
/// PDF points. `page` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub page: usize,
}

impl Coordinates {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// One addressable text unit extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paragraph {
    /// Position within the owning document's paragraph list.
    pub index: usize,
    pub text: String,
    pub coordinates: Coordinates,
}

/// A document together with its ordered paragraphs.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    document: Document,
    paragraphs: Vec<Paragraph>,
}

impl ParsedDocument {
    /// Builds a parsed document from paragraphs in reading order.
    ///
    /// Each paragraph's `index` is set to its position.
    pub fn new(
        document: Document,
        paragraphs: impl IntoIterator<Item = (String, Coordinates)>,
    ) -> Self {
        let paragraphs = paragraphs
            .into_iter()
            .enumerate()
            .map(|(index, (text, coordinates))| Paragraph {
                index,
                text,
                coordinates,
            })
            .collect();
        Self {
            document,
            paragraphs,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn name(&self) -> &str {
        self.document.name()
    }

    pub fn content(&self) -> &[u8] {
        self.document.content()
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraph(&self, index: usize) -> Option<&Paragraph> {
        self.paragraphs.get(index)
    }

    pub fn paragraph_texts(&self) -> Vec<&str> {
        self.paragraphs.iter().map(|p| p.text.as_str()).collect()
    }

    pub fn paragraph_coordinates(&self) -> Vec<Coordinates> {
        self.paragraphs.iter().map(|p| p.coordinates).collect()
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Same name and paragraphs, different bytes (e.g. an annotated copy).
    pub fn with_content(&self, content: Vec<u8>) -> Self {
        Self {
            document: Document::new(self.document.name.clone(), content),
            paragraphs: self.paragraphs.clone(),
        }
    }
}

/// A paragraph scored against one question.
///
/// Holds a shared handle to its document and the paragraph's index, so the
/// text and the on-page location are both reachable without searching.
#[derive(Debug, Clone)]
pub struct RankedParagraph {
    pub document: Arc<ParsedDocument>,
    pub index: usize,
    pub score: f32,
}

impl RankedParagraph {
    pub fn paragraph(&self) -> &Paragraph {
        &self.document.paragraphs()[self.index]
    }

    pub fn text(&self) -> &str {
        &self.paragraph().text
    }

    pub fn document_name(&self) -> &str {
        self.document.name()
    }
}
