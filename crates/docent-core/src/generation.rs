//! Generation service trait and candidate selection.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::Error;

/// Per-request sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
    /// Number of candidate completions to request.
    pub num_generations: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.3,
            num_generations: 2,
        }
    }
}

/// One candidate completion with its likelihood (higher is more likely).
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub likelihood: f64,
}

/// A text generation service.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Produce one or more candidate completions for `prompt`.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Vec<Generation>>;
}

/// Picks the highest-likelihood candidate and trims surrounding whitespace.
///
/// Ties go to the earliest candidate.
pub fn pick_best(generations: Vec<Generation>) -> Result<String, Error> {
    let mut best: Option<Generation> = None;
    for candidate in generations {
        match &best {
            Some(current) if candidate.likelihood <= current.likelihood => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|g| g.text.trim().to_string())
        .ok_or(Error::EmptyGeneration)
}
