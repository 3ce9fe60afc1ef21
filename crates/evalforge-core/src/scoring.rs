use async_trait::async_trait;

use crate::model::ScoreSet;

/// A pluggable text-similarity scorer. Each implementation fills only its own
/// fields of the returned partial `ScoreSet`; a field left `None` is a
/// missing value, excluded from aggregation, never a zero.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score a generated response against the expected answer.
    async fn score(&self, expected: &str, response: &str) -> anyhow::Result<ScoreSet>;
}
