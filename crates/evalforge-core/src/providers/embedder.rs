use async_trait::async_trait;
use serde_json::json;

/// Sentence-embedding backend used by the optional semantic-similarity
/// scorer. When no embedder is configured the semantic score is simply
/// absent on every result.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> String;
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// OpenAI-compatible embeddings endpoint.
pub struct OpenAiEmbedder {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            model,
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "input": text,
            "model": self.model,
            "encoding_format": "float"
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("embeddings API error ({}): {}", status, error_text);
        }

        let json: serde_json::Value = resp.json().await?;
        let vec = json
            .pointer("/data/0/embedding")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("embeddings API response missing embedding"))?
            .iter()
            .map(|x| {
                x.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| anyhow::anyhow!("embedding contains non-numeric value"))
            })
            .collect::<anyhow::Result<Vec<f32>>>()?;
        Ok(vec)
    }
}
