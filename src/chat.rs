//! Chat model abstraction used to phrase answers.
//!
//! The chat provider follows `embedding.provider`: `GOOGLE` uses Gemini via
//! `generateContent`, `OPENAI` uses `/chat/completions`, and `LOCAL` has no
//! chat model at all (the answer engine then returns raw context).

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::config::{Config, Provider};
use crate::embedding::{http_client, require_key, send_json};
use crate::error::ProviderError;

/// Completes a single prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Create the chat model for the configured provider, or `None` for `LOCAL`.
pub fn select_chat_model(config: &Config) -> Result<Option<Arc<dyn ChatModel>>> {
    match config.embedding.provider {
        Provider::Local => Ok(None),
        Provider::Google => Ok(Some(Arc::new(GoogleChat::new(config)?))),
        Provider::OpenAI => Ok(Some(Arc::new(OpenAIChat::new(config)?))),
    }
}

/// Gemini through the Generative Language API.
pub struct GoogleChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GoogleChat {
    pub fn new(config: &Config) -> Result<Self> {
        let embedding = &config.embedding;
        let api_key = require_key(embedding.google_api_key.as_ref(), "GOOGLE", "GOOGLE_API_KEY")?;
        Ok(Self {
            client: http_client(embedding.timeout_secs)?,
            api_key,
            model: crate::embedding::google_model_name(&config.chat.google_model),
            base_url: embedding.google_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for GoogleChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(provider = "Google", model = %self.model, "chat completion");
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        let request = self
            .client
            .post(format!("{}/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let json = send_json("Google", request).await?;
        parse_gemini_response(&json)
    }
}

/// OpenAI chat completions.
pub struct OpenAIChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIChat {
    pub fn new(config: &Config) -> Result<Self> {
        let embedding = &config.embedding;
        let api_key = require_key(embedding.openai_api_key.as_ref(), "OPENAI", "OPENAI_API_KEY")?;
        Ok(Self {
            client: http_client(embedding.timeout_secs)?,
            api_key,
            model: config.chat.openai_model.clone(),
            base_url: embedding.openai_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(provider = "OpenAI", model = %self.model, "chat completion");
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);

        let json = send_json("OpenAI", request).await?;
        parse_openai_response(&json)
    }
}

fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse {
            provider: "Google",
            message: "response has no candidate content".to_string(),
        })?;

    Ok(parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::InvalidResponse {
                provider: "OpenAI",
                message: "response has no message content".to_string(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_has_no_chat_model() {
        let mut config = Config::default();
        config.embedding.provider = Provider::Local;
        assert!(select_chat_model(&config).unwrap().is_none());
    }

    #[test]
    fn google_chat_requires_key() {
        let mut config = Config::default();
        config.embedding.provider = Provider::Google;
        config.embedding.google_api_key = None;
        let err = select_chat_model(&config).err().unwrap();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn google_chat_model_is_prefixed() {
        let mut config = Config::default();
        config.embedding.provider = Provider::Google;
        config.embedding.google_api_key = Some("key".into());
        let chat = select_chat_model(&config).unwrap().unwrap();
        assert_eq!(chat.model_name(), "models/gemini-2.5-flash");
    }

    #[test]
    fn parses_gemini_parts() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello, " }, { "text": "world" }] } }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "Hello, world");
        assert!(parse_gemini_response(&serde_json::json!({ "candidates": [] })).is_err());
    }

    #[test]
    fn parses_openai_message() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "42" } }]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), "42");
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
    }
}
