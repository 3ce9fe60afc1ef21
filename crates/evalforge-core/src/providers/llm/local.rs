use super::InferenceClient;
use crate::model::SamplingParams;
use async_trait::async_trait;
use serde_json::json;

/// Client for a local inference endpoint (Ollama wire shape):
/// `POST {endpoint}/api/generate`, `GET {endpoint}/api/tags`.
pub struct LocalInferenceClient {
    pub endpoint: String,
    pub model: String,
    pub client: reqwest::Client,
}

impl LocalInferenceClient {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl InferenceClient for LocalInferenceClient {
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> anyhow::Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": params.temperature,
                "num_predict": params.max_tokens,
                "top_p": params.top_p,
            }
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("inference API error ({}): {}", status, error_text);
        }

        let json: serde_json::Value = resp.json().await?;
        let text = json
            .pointer("/response")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("inference API response missing 'response' field"))?
            .trim()
            .to_string();
        Ok(text)
    }

    async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/api/tags", self.endpoint);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("tags API error: {}", resp.status());
        }
        let json: serde_json::Value = resp.json().await?;
        let names = json
            .pointer("/models")
            .and_then(|v| v.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    fn provider_name(&self) -> &'static str {
        "local_inference"
    }
}

/// Connectivity match: exact name, or a tag-qualified variant of the target
/// (e.g. "llama3.2" matches "llama3.2:latest").
pub fn model_listed(target: &str, names: &[String]) -> bool {
    names
        .iter()
        .any(|name| name == target || name.starts_with(&format!("{}:", target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_exact_and_tagged_names() {
        let names = vec!["llama3.2:latest".to_string(), "phi3".to_string()];
        assert!(model_listed("llama3.2", &names));
        assert!(model_listed("phi3", &names));
        assert!(!model_listed("llama3", &names));
        assert!(!model_listed("mistral", &names));
    }
}
