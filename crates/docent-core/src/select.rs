//! Adaptive context selection.
//!
//! Starting from the best-ranked paragraph, runner-ups are added one at a
//! time for as long as the selected scores stay statistically homogeneous:
//! a candidate is rejected (and the walk stops) once the population
//! standard deviation of the selection plus the candidate reaches
//! [`SelectionParams::std_threshold`], or once
//! [`SelectionParams::max_paragraphs`] are selected.
//!
//! This bounds the size of the generation context without a fixed score
//! cutoff, so it adapts to each question's score distribution.

use std::collections::VecDeque;
use tracing::info;

use crate::models::RankedParagraph;

/// Tuning for [`select_context`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionParams {
    /// Upper bound on the number of selected paragraphs.
    pub max_paragraphs: usize,
    /// The walk stops when the score standard deviation would reach this.
    pub std_threshold: f64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            max_paragraphs: 10,
            std_threshold: 0.01,
        }
    }
}

/// Select context paragraphs from an ascending ranking.
///
/// `ranked` must be sorted ascending by score (as produced by
/// [`rank_paragraphs`](crate::rank::rank_paragraphs)); it is not modified.
/// The result is also ascending, with the best match last.
pub fn select_context(
    ranked: &[RankedParagraph],
    params: &SelectionParams,
) -> Vec<RankedParagraph> {
    let Some((best, runner_ups)) = ranked.split_last() else {
        return Vec::new();
    };

    let mut selected = VecDeque::from([best.clone()]);
    let mut scores = vec![best.score as f64];

    for candidate in runner_ups.iter().rev() {
        if selected.len() >= params.max_paragraphs {
            break;
        }
        scores.push(candidate.score as f64);
        if population_std_dev(&scores) >= params.std_threshold {
            break;
        }
        selected.push_front(candidate.clone());
    }

    selected.into()
}

/// Population standard deviation (divides by `n`). Zero for empty input.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Join selected paragraph texts into the generation context, one per line.
pub fn build_context(selected: &[RankedParagraph]) -> String {
    let scores: Vec<f32> = selected.iter().map(|p| p.score).collect();
    info!(count = selected.len(), ?scores, "paragraphs chosen for context");
    selected
        .iter()
        .map(|p| p.text())
        .collect::<Vec<_>>()
        .join("\n")
}
