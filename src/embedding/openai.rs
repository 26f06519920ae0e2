use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{http_client, json_to_vec, require_key, send_json, Embedder};
use crate::config::EmbeddingConfig;
use crate::error::ProviderError;

const PROVIDER: &str = "OpenAI";

/// Embedder backed by the OpenAI embeddings API.
///
/// Calls `POST {base_url}/embeddings` with the configured model; the whole
/// batch goes out in one request.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIEmbedder {
    /// # Errors
    ///
    /// Fails when `OPENAI_API_KEY` is not configured.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = require_key(config.openai_api_key.as_ref(), "OPENAI", "OPENAI_API_KEY")?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            model: config.openai_model.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);

        let json = send_json(PROVIDER, request).await?;
        parse_openai_response(&json, texts.len())
    }
}

/// Parse the embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays, ordered by their `index` field so
/// the output lines up with the input.
fn parse_openai_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: "missing data array".to_string(),
        })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item.get("embedding").ok_or_else(|| ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: "missing embedding".to_string(),
        })?;
        indexed.push((index, json_to_vec(PROVIDER, embedding)?));
    }
    indexed.sort_by_key(|(index, _)| *index);

    if indexed.len() != expected {
        return Err(ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: format!("expected {} embeddings, got {}", expected, indexed.len()),
        }
        .into());
    }

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}
