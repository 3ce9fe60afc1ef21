use async_trait::async_trait;
use evalforge_core::model::ScoreSet;
use evalforge_core::scoring::Scorer;

use crate::text::{clipped_overlap, ngram_counts, tokenize};

/// ROUGE-1, ROUGE-2 (n-gram overlap F1) and ROUGE-L (longest common
/// subsequence F1) in one pass over the token streams.
pub struct RougeScorer;

#[async_trait]
impl Scorer for RougeScorer {
    fn name(&self) -> &'static str {
        "rouge"
    }

    async fn score(&self, expected: &str, response: &str) -> anyhow::Result<ScoreSet> {
        let reference = tokenize(expected);
        let candidate = tokenize(response);
        if reference.is_empty() || candidate.is_empty() {
            return Ok(ScoreSet::default());
        }
        Ok(ScoreSet {
            rouge_1: Some(rouge_n(&reference, &candidate, 1)),
            rouge_2: Some(rouge_n(&reference, &candidate, 2)),
            rouge_l: Some(rouge_l(&reference, &candidate)),
            ..ScoreSet::default()
        })
    }
}

fn f1(overlap: usize, reference_total: usize, candidate_total: usize) -> f64 {
    if reference_total == 0 || candidate_total == 0 || overlap == 0 {
        return 0.0;
    }
    let recall = overlap as f64 / reference_total as f64;
    let precision = overlap as f64 / candidate_total as f64;
    2.0 * precision * recall / (precision + recall)
}

pub fn rouge_n(reference: &[String], candidate: &[String], n: usize) -> f64 {
    let ref_counts = ngram_counts(reference, n);
    let cand_counts = ngram_counts(candidate, n);
    let overlap = clipped_overlap(&cand_counts, &ref_counts);
    f1(
        overlap,
        ref_counts.values().sum(),
        cand_counts.values().sum(),
    )
}

pub fn rouge_l(reference: &[String], candidate: &[String]) -> f64 {
    let lcs = lcs_len(reference, candidate);
    f1(lcs, reference.len(), candidate.len())
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            cur[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        tokenize(s)
    }

    #[test]
    fn identical_sentences_score_one() {
        let t = toks("the cat sat");
        assert!((rouge_n(&t, &t, 1) - 1.0).abs() < 1e-9);
        assert!((rouge_n(&t, &t, 2) - 1.0).abs() < 1e-9);
        assert!((rouge_l(&t, &t) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_sentences_score_zero() {
        let a = toks("alpha beta");
        let b = toks("gamma delta");
        assert_eq!(rouge_n(&a, &b, 1), 0.0);
        assert_eq!(rouge_l(&a, &b), 0.0);
    }

    #[test]
    fn lcs_respects_order() {
        // "a c" is a subsequence of both; "c a" in the candidate does not
        // extend it.
        let a = toks("a b c");
        let b = toks("a c b");
        assert_eq!(lcs_len(&a, &b), 2);
    }

    #[test]
    fn rouge_1_counts_unigram_overlap() {
        let reference = toks("the cat sat");
        let candidate = toks("the dog sat");
        // overlap 2, recall 2/3, precision 2/3 -> f1 = 2/3
        assert!((rouge_n(&reference, &candidate, 1) - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_inputs_leave_scores_absent() {
        let set = RougeScorer.score("", "whatever").await.unwrap();
        assert_eq!(set.rouge_1, None);
        assert_eq!(set.rouge_l, None);
    }
}
