use crate::model::SamplingParams;
use async_trait::async_trait;

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Generate a completion for one prompt with the given sampling params.
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> anyhow::Result<String>;

    /// List the model identifiers the backend serves.
    async fn list_models(&self) -> anyhow::Result<Vec<String>>;

    fn provider_name(&self) -> &'static str;
}

pub mod local;
