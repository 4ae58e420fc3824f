//! Embedding service trait and vector similarity.
//!
//! Defines the [`Embedder`] trait that every embedding backend implements,
//! plus [`cosine_similarity`], the relevance measure used by the ranker.
//!
//! Concrete backends (OpenAI-compatible HTTP, disabled) live in the `docent`
//! application crate.

use anyhow::Result;
use async_trait::async_trait;

/// An embedding service.
///
/// Given an ordered batch of texts, returns one vector per text in the same
/// order. Batches may mix paragraph texts with a trailing question; the
/// service must not reorder them.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, and
/// zero-norm vectors, where the ratio is undefined.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0) as f32
}
