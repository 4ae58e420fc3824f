//! Similarity ranking of paragraphs against a question.
//!
//! # Algorithm
//!
//! 1. Flatten `(document, paragraph)` pairs in document order, then
//!    paragraph order.
//! 2. Split documents into cached (embeddings already in the
//!    [`SessionCache`]) and uncached.
//! 3. Embed every uncached paragraph plus the question in one batch; the
//!    question is always the last element.
//! 4. Score each paragraph with [`cosine_similarity`] against the question.
//! 5. Store the new paragraph vectors in the cache, grouped per document.
//! 6. Sort ascending by score (stable, so ties keep flattened order).
//!
//! The output is least relevant first: the best match is the last element.
//!
//! If the embedding service fails, nothing is ranked and nothing is cached;
//! the caller gets [`Error::EmbeddingServiceUnavailable`], which is distinct
//! from an empty ranking.

use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::SessionCache;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{Error, Result};
use crate::models::{ParsedDocument, RankedParagraph};

/// Rank every paragraph of `documents` against `question`.
///
/// Returns an empty ranking, without calling the service, when the documents
/// contain no paragraphs at all.
pub async fn rank_paragraphs(
    documents: &[Arc<ParsedDocument>],
    question: &str,
    embedder: &dyn Embedder,
    cache: &mut SessionCache,
) -> Result<Vec<RankedParagraph>> {
    let total: usize = documents.iter().map(|doc| doc.len()).sum();
    if total == 0 {
        return Ok(Vec::new());
    }

    let cached: Vec<bool> = documents
        .iter()
        .map(|doc| cache.has_embeddings(doc))
        .collect();

    let mut texts: Vec<String> = documents
        .iter()
        .zip(&cached)
        .filter(|(_, is_cached)| !**is_cached)
        .flat_map(|(doc, _)| doc.paragraphs().iter().map(|p| p.text.clone()))
        .collect();
    texts.push(question.to_string());

    let mut vectors = embedder.embed(&texts).await.map_err(|e| {
        warn!(model = embedder.model_name(), error = %e, "embedding request failed");
        Error::EmbeddingServiceUnavailable(e.to_string())
    })?;

    if vectors.len() != texts.len() {
        return Err(Error::EmbeddingCountMismatch {
            expected: texts.len(),
            actual: vectors.len(),
        });
    }
    let question_vec = vectors.pop().ok_or(Error::EmbeddingCountMismatch {
        expected: texts.len(),
        actual: 0,
    })?;

    // Fresh vectors in flattened order, one group per uncached document.
    let mut fresh = vectors.into_iter();
    let mut fresh_groups: Vec<Option<Vec<Vec<f32>>>> = Vec::with_capacity(documents.len());
    for (doc, &is_cached) in documents.iter().zip(&cached) {
        if is_cached {
            fresh_groups.push(None);
        } else {
            fresh_groups.push(Some(fresh.by_ref().take(doc.len()).collect()));
        }
    }

    let mut ranked = Vec::with_capacity(total);
    for (doc, group) in documents.iter().zip(&fresh_groups) {
        let doc_vectors: &[Vec<f32>] = match group {
            Some(vectors) => vectors,
            None => {
                info!(document = doc.name(), "obtained embeddings from cache");
                cache.get_embeddings(doc)?
            }
        };
        for (index, vector) in doc_vectors.iter().enumerate() {
            ranked.push(RankedParagraph {
                document: Arc::clone(doc),
                index,
                score: cosine_similarity(vector, &question_vec),
            });
        }
    }

    for (doc, group) in documents.iter().zip(fresh_groups) {
        if let Some(vectors) = group {
            cache.put_embeddings(doc, vectors)?;
            info!(document = doc.name(), paragraphs = doc.len(), "cached embeddings");
        }
    }

    ranked.sort_by(|a, b| a.score.total_cmp(&b.score));
    Ok(ranked)
}
