use std::sync::Arc;

use async_trait::async_trait;
use evalforge_core::embeddings::cosine_similarity;
use evalforge_core::model::ScoreSet;
use evalforge_core::providers::embedder::Embedder;
use evalforge_core::scoring::Scorer;

/// Cosine similarity of sentence embeddings, clamped to [0, 1].
pub struct SemanticScorer {
    embedder: Arc<dyn Embedder>,
}

impl SemanticScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl Scorer for SemanticScorer {
    fn name(&self) -> &'static str {
        "semantic_similarity"
    }

    async fn score(&self, expected: &str, response: &str) -> anyhow::Result<ScoreSet> {
        if expected.trim().is_empty() || response.trim().is_empty() {
            return Ok(ScoreSet::default());
        }
        let expected_vec = self.embedder.embed(expected).await?;
        let response_vec = self.embedder.embed(response).await?;
        let similarity = cosine_similarity(&expected_vec, &response_vec)?.clamp(0.0, 1.0);
        Ok(ScoreSet {
            semantic_similarity: Some(similarity),
            ..ScoreSet::default()
        })
    }
}
