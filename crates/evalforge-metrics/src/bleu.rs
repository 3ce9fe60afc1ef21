use async_trait::async_trait;
use evalforge_core::model::ScoreSet;
use evalforge_core::scoring::Scorer;

use crate::text::{clipped_overlap, ngram_counts, tokenize};

/// Smoothed sentence BLEU: geometric mean of clipped n-gram precisions up to
/// 4-grams, with a brevity penalty. Zero-match orders are smoothed to
/// 1 / (2 * total) instead of collapsing the whole product to zero.
pub struct BleuScorer;

#[async_trait]
impl Scorer for BleuScorer {
    fn name(&self) -> &'static str {
        "bleu"
    }

    async fn score(&self, expected: &str, response: &str) -> anyhow::Result<ScoreSet> {
        Ok(ScoreSet {
            bleu: sentence_bleu(expected, response),
            ..ScoreSet::default()
        })
    }
}

pub fn sentence_bleu(reference: &str, candidate: &str) -> Option<f64> {
    let reference = tokenize(reference);
    let candidate = tokenize(candidate);
    if reference.is_empty() || candidate.is_empty() {
        return None;
    }

    let max_n = 4.min(candidate.len()).min(reference.len());
    let mut log_sum = 0.0;
    for n in 1..=max_n {
        let cand_counts = ngram_counts(&candidate, n);
        let ref_counts = ngram_counts(&reference, n);
        let total: usize = cand_counts.values().sum();
        let matches = clipped_overlap(&cand_counts, &ref_counts);
        let precision = if matches == 0 {
            1.0 / (2.0 * total.max(1) as f64)
        } else {
            matches as f64 / total as f64
        };
        log_sum += precision.ln();
    }
    let precision = (log_sum / max_n as f64).exp();

    let brevity_penalty = if candidate.len() >= reference.len() {
        1.0
    } else {
        (1.0 - reference.len() as f64 / candidate.len() as f64).exp()
    };

    Some((precision * brevity_penalty).clamp(0.0, 1.0))
}
