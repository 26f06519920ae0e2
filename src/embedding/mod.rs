//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and three interchangeable backends:
//! - **[`LocalEmbedder`]**: runs a sentence-transformer locally via fastembed; no network after model download.
//! - **[`GoogleEmbedder`]**: calls the Generative Language `batchEmbedContents` endpoint.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI `/embeddings` endpoint.
//!
//! Also provides vector utilities used by the store:
//! - [`cosine_similarity`]: compute similarity between two embedding vectors
//! - [`vec_to_blob`]: encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`]: decode a SQLite BLOB back into a `Vec<f32>`
//!
//! # Provider Selection
//!
//! [`select_embedder`] picks the backend from `embedding.provider`. Cloud
//! providers fail at selection time when their API key is missing; a
//! misconfigured provider is never silently replaced by another.
//!
//! # Retries
//!
//! Providers make exactly one request per call. Retry and backoff live in
//! the ingest path ([`crate::store::VectorStoreManager`]), which also needs to
//! tell quota failures ([`ProviderError::QuotaExceeded`]) apart from
//! transient ones.

mod google;
#[cfg(feature = "local-embeddings-fastembed")]
mod local;
mod openai;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, Provider};
use crate::error::{ConfigError, ProviderError};

pub use google::GoogleEmbedder;
pub(crate) use google::model_resource_name as google_model_name;
#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalEmbedder;
pub use openai::OpenAIEmbedder;

/// Turns text into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_many(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

/// Create the [`Embedder`] for the configured provider.
///
/// | Provider | Backend | Credential |
/// |----------|---------|------------|
/// | `LOCAL` | [`LocalEmbedder`] | none |
/// | `GOOGLE` | [`GoogleEmbedder`] | `GOOGLE_API_KEY` |
/// | `OPENAI` | [`OpenAIEmbedder`] | `OPENAI_API_KEY` |
///
/// # Errors
///
/// [`ConfigError::MissingCredential`] when a cloud provider has no key, and
/// [`ConfigError::FeatureDisabled`] for `LOCAL` in a build without
/// `local-embeddings-fastembed`.
pub fn select_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        Provider::Google => Ok(Arc::new(GoogleEmbedder::new(config)?)),
        Provider::OpenAI => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        Provider::Local => Ok(Arc::new(LocalEmbedder::new(&config.hf_model)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        Provider::Local => Err(ConfigError::FeatureDisabled(
            "Local embedding provider requires --features local-embeddings-fastembed".to_string(),
        )
        .into()),
    }
}

/// Return the key if present and non-blank, else a named credential error.
pub(crate) fn require_key(
    key: Option<&String>,
    provider: &'static str,
    variable: &'static str,
) -> Result<String, ConfigError> {
    match key {
        Some(k) if !k.trim().is_empty() => Ok(k.clone()),
        _ => Err(ConfigError::MissingCredential { provider, variable }),
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a JSON request and return the parsed body, mapping failures onto
/// [`ProviderError`].
pub(crate) async fn send_json(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value> {
    let response = request.send().await.map_err(|e| ProviderError::Request {
        provider,
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(provider, status.as_u16(), &body).into());
    }

    let json = response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| ProviderError::InvalidResponse {
            provider,
            message: e.to_string(),
        })?;
    Ok(json)
}

/// Read a JSON array of numbers as a vector.
pub(crate) fn json_to_vec(provider: &'static str, value: &serde_json::Value) -> Result<Vec<f32>> {
    let values = value.as_array().ok_or_else(|| ProviderError::InvalidResponse {
        provider,
        message: "embedding is not an array".to_string(),
    })?;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64().map(|x| x as f32).ok_or_else(|| {
                anyhow::Error::from(ProviderError::InvalidResponse {
                    provider,
                    message: format!("embedding element {} is not a number: {}", i, v),
                })
            })
        })
        .collect()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// a BLOB of `vec.len() × 4` bytes.
///
/// # Example
///
/// ```rust
/// use pdf_rag::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values
/// from the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths, which
/// is what a store built with a different model yields.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn json_vector_rejects_non_numbers() {
        let ok = json_to_vec("Test", &serde_json::json!([0.5, -1, 2.25])).unwrap();
        assert_eq!(ok, vec![0.5, -1.0, 2.25]);

        let err = json_to_vec("Test", &serde_json::json!([0.5, "oops", 1.0])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::InvalidResponse { .. })
        ));
        assert!(err.to_string().contains("element 1"));
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_google_requires_key() {
        let config = EmbeddingConfig {
            provider: Provider::Google,
            google_api_key: None,
            ..EmbeddingConfig::default()
        };
        let err = select_embedder(&config).err().unwrap();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_openai_requires_key() {
        let config = EmbeddingConfig {
            provider: Provider::OpenAI,
            openai_api_key: Some("   ".into()),
            ..EmbeddingConfig::default()
        };
        let err = select_embedder(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingCredential { variable: "OPENAI_API_KEY", .. })
        ));
    }

    #[test]
    fn test_selection_by_config() {
        let google = EmbeddingConfig {
            provider: Provider::Google,
            google_api_key: Some("g".into()),
            ..EmbeddingConfig::default()
        };
        assert_eq!(
            select_embedder(&google).unwrap().model_name(),
            "models/text-embedding-004"
        );

        let openai = EmbeddingConfig {
            provider: Provider::OpenAI,
            openai_api_key: Some("sk".into()),
            ..EmbeddingConfig::default()
        };
        assert_eq!(
            select_embedder(&openai).unwrap().model_name(),
            "text-embedding-3-small"
        );
    }

    #[test]
    fn test_json_to_vec_rejects_non_array() {
        assert!(json_to_vec("OpenAI", &serde_json::json!({"x": 1})).is_err());
        assert_eq!(
            json_to_vec("OpenAI", &serde_json::json!([0.5, 1.0])).unwrap(),
            vec![0.5, 1.0]
        );
    }
}
