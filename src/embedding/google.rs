use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{http_client, json_to_vec, require_key, send_json, Embedder};
use crate::config::EmbeddingConfig;
use crate::error::ProviderError;

const PROVIDER: &str = "Google";

/// Maximum texts per `batchEmbedContents` request.
const MAX_BATCH: usize = 100;

/// Embedder backed by the Google Generative Language API.
///
/// Documents are embedded with task type `RETRIEVAL_DOCUMENT` and queries
/// with `RETRIEVAL_QUERY`, which is what the model expects for asymmetric
/// search.
pub struct GoogleEmbedder {
    client: reqwest::Client,
    api_key: String,
    /// Model resource name, always `models/...`.
    model: String,
    base_url: String,
}

impl GoogleEmbedder {
    /// # Errors
    ///
    /// Fails when `GOOGLE_API_KEY` is not configured.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = require_key(config.google_api_key.as_ref(), "GOOGLE", "GOOGLE_API_KEY")?;
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            model: model_resource_name(&config.google_model),
            base_url: config.google_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn embed_with_task(&self, texts: &[String], task_type: &str) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!(provider = PROVIDER, batch_size = batch.len(), task_type, "embedding batch");

            let requests: Vec<serde_json::Value> = batch
                .iter()
                .map(|text| {
                    serde_json::json!({
                        "model": self.model,
                        "content": { "parts": [{ "text": text }] },
                        "taskType": task_type,
                    })
                })
                .collect();
            let request = self
                .client
                .post(format!("{}/{}:batchEmbedContents", self.base_url, self.model))
                .header("x-goog-api-key", &self.api_key)
                .json(&serde_json::json!({ "requests": requests }));

            let json = send_json(PROVIDER, request).await?;
            let parsed = parse_batch_response(&json)?;
            if parsed.len() != batch.len() {
                return Err(ProviderError::InvalidResponse {
                    provider: PROVIDER,
                    message: format!("expected {} embeddings, got {}", batch.len(), parsed.len()),
                }
                .into());
            }
            vectors.extend(parsed);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for GoogleEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_with_task(texts, "RETRIEVAL_DOCUMENT").await
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self
            .embed_with_task(&[text.to_string()], "RETRIEVAL_QUERY")
            .await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

/// Google model names are addressed as `models/<name>`.
pub(crate) fn model_resource_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn parse_batch_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: "missing embeddings array".to_string(),
        })?;

    embeddings
        .iter()
        .map(|item| {
            let values = item.get("values").ok_or_else(|| ProviderError::InvalidResponse {
                provider: PROVIDER,
                message: "embedding without values".to_string(),
            })?;
            json_to_vec(PROVIDER, values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_name_gets_prefix() {
        assert_eq!(model_resource_name("text-embedding-004"), "models/text-embedding-004");
        assert_eq!(model_resource_name("models/gemini-embedding-001"), "models/gemini-embedding-001");
    }

    #[test]
    fn parses_batch_values() {
        let json = serde_json::json!({
            "embeddings": [{"values": [0.1, 0.2]}, {"values": [0.3, 0.4]}]
        });
        let vectors = parse_batch_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn missing_embeddings_is_invalid() {
        assert!(parse_batch_response(&serde_json::json!({"error": {}})).is_err());
    }
}
