//! Per-session cache for paragraph embeddings and generated answers.
//!
//! A [`SessionCache`] is owned by exactly one session and passed by
//! reference to whatever needs it; two sessions never share one. Entries are
//! created lazily and live until the cache is dropped; there is no capacity
//! bound and no expiry.
//!
//! Embeddings are keyed by document name. Each entry also remembers the
//! content fingerprint it was computed for, so a different document that
//! reuses a name is reported as not cached instead of being zipped with
//! vectors that belong to other paragraphs.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::{ParsedDocument, RankedParagraph};

/// Key under which a generated answer (or summary) is cached.
///
/// A SHA-256 digest over a tagged, length-prefixed encoding of its parts, so
/// distinct `(document names, question)` tuples never share a key even when
/// their plain concatenations are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnswerKey {
    digest: String,
    summary: bool,
}

const QUESTION_TAG: u8 = b'q';
const SUMMARY_TAG: u8 = b's';

impl AnswerKey {
    /// Key for a question asked against documents, in session order.
    pub fn question<S: AsRef<str>>(document_names: &[S], question: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([QUESTION_TAG]);
        hasher.update((document_names.len() as u64).to_le_bytes());
        for name in document_names {
            update_prefixed(&mut hasher, name.as_ref());
        }
        update_prefixed(&mut hasher, question);
        Self {
            digest: hex::encode(hasher.finalize()),
            summary: false,
        }
    }

    /// Key for a summary of `text`.
    pub fn summary(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update([SUMMARY_TAG]);
        update_prefixed(&mut hasher, text);
        Self {
            digest: hex::encode(hasher.finalize()),
            summary: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.digest
    }

    pub fn is_summary(&self) -> bool {
        self.summary
    }
}

fn update_prefixed(hasher: &mut Sha256, part: &str) {
    hasher.update((part.len() as u64).to_le_bytes());
    hasher.update(part.as_bytes());
}

#[derive(Debug)]
struct CachedEmbeddings {
    fingerprint: String,
    vectors: Vec<Vec<f32>>,
}

#[derive(Debug)]
struct CachedAnswer {
    text: String,
    /// Paragraphs the answer was generated from; empty for summaries.
    context: Vec<RankedParagraph>,
}

/// Session-scoped embedding and answer store.
#[derive(Debug, Default)]
pub struct SessionCache {
    embeddings: HashMap<String, CachedEmbeddings>,
    answers: HashMap<AnswerKey, CachedAnswer>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_embeddings(&self, doc: &ParsedDocument) -> bool {
        self.embeddings
            .get(doc.name())
            .is_some_and(|entry| entry.fingerprint == doc.document().fingerprint())
    }

    /// Paragraph embeddings for `doc`, in paragraph order.
    ///
    /// Asking for a document that was never embedded is a caller bug; check
    /// [`has_embeddings`](Self::has_embeddings) first.
    pub fn get_embeddings(&self, doc: &ParsedDocument) -> Result<&[Vec<f32>]> {
        match self.embeddings.get(doc.name()) {
            Some(entry) if entry.fingerprint == doc.document().fingerprint() => {
                Ok(&entry.vectors)
            }
            _ => Err(Error::CacheMiss(doc.name().to_string())),
        }
    }

    /// Store one vector per paragraph of `doc`, replacing any previous entry.
    pub fn put_embeddings(&mut self, doc: &ParsedDocument, vectors: Vec<Vec<f32>>) -> Result<()> {
        if vectors.len() != doc.len() {
            return Err(Error::EmbeddingCountMismatch {
                expected: doc.len(),
                actual: vectors.len(),
            });
        }
        self.embeddings.insert(
            doc.name().to_string(),
            CachedEmbeddings {
                fingerprint: doc.document().fingerprint().to_string(),
                vectors,
            },
        );
        Ok(())
    }

    pub fn has_answer(&self, key: &AnswerKey) -> bool {
        self.answers.contains_key(key)
    }

    pub fn get_answer(&self, key: &AnswerKey) -> Option<&str> {
        self.answers.get(key).map(|entry| entry.text.as_str())
    }

    /// The context stored with the answer under `key`, ascending by score.
    pub fn get_answer_context(&self, key: &AnswerKey) -> Option<&[RankedParagraph]> {
        self.answers.get(key).map(|entry| entry.context.as_slice())
    }

    pub fn put_answer(&mut self, key: AnswerKey, answer: String) {
        self.put_answer_with_context(key, answer, Vec::new());
    }

    pub fn put_answer_with_context(
        &mut self,
        key: AnswerKey,
        answer: String,
        context: Vec<RankedParagraph>,
    ) {
        self.answers.insert(
            key,
            CachedAnswer {
                text: answer,
                context,
            },
        );
    }

    /// Forget everything derived from the document called `name`.
    ///
    /// Drops its embeddings and every cached answer, since answers are keyed
    /// by document names and cannot tell old content from new (their stored
    /// context would also point at the replaced document). Summaries depend
    /// only on their text and are kept.
    pub fn invalidate_document(&mut self, name: &str) {
        self.embeddings.remove(name);
        self.answers.retain(|key, _| key.is_summary());
    }

    /// Number of documents with cached embeddings.
    pub fn embedded_documents(&self) -> usize {
        self.embeddings.len()
    }

    /// Number of cached answers and summaries.
    pub fn cached_answers(&self) -> usize {
        self.answers.len()
    }
}
