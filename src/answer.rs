//! Retrieval and answer generation.
//!
//! [`AnswerEngine::answer`] runs the read path: embed the question, search
//! the store, optionally narrow the hits to one source file, then either ask
//! the chat model or return the leading slice of the retrieved context.
//!
//! # Output
//!
//! - `text`: chat completion, `"No results found."`, the invocation error
//!   text, or the first [`OFFLINE_CONTEXT_CHARS`] characters of context.
//! - `sources`: source of every retained hit, in score order.
//! - `hits`: the first [`MAX_HIT_SUMMARIES`] retained hits.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::chat::ChatModel;
use crate::embedding::Embedder;
use crate::models::{Answer, Hit, HitSummary};
use crate::store::VectorStore;

pub const NO_RESULTS: &str = "No results found.";

/// Characters of raw context returned when no chat model is configured.
pub const OFFLINE_CONTEXT_CHARS: usize = 1000;

pub const MAX_HIT_SUMMARIES: usize = 10;

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Answers questions from the vector store.
pub struct AnswerEngine {
    embedder: Arc<dyn Embedder>,
    chat: Option<Arc<dyn ChatModel>>,
    store: Arc<dyn VectorStore>,
}

impl AnswerEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chat: Option<Arc<dyn ChatModel>>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            embedder,
            chat,
            store,
        }
    }

    /// Retrieve up to `k` hits for `question` and build an answer from them.
    ///
    /// A blank `source_filter` means no filter. Results below `threshold`
    /// are still used; the low score is only logged.
    ///
    /// # Errors
    ///
    /// Embedding or store failures. A failing chat model does not error; its
    /// message becomes the answer text.
    pub async fn answer(
        &self,
        question: &str,
        k: usize,
        threshold: f32,
        source_filter: Option<&str>,
    ) -> Result<Answer> {
        let query = self
            .embedder
            .embed_one(question)
            .await
            .context("Failed to embed question")?;
        let mut hits = self
            .store
            .search(&query, k)
            .await
            .context("Vector search failed")?;

        if let Some(filter) = source_filter.map(str::trim).filter(|f| !f.is_empty()) {
            let before = hits.len();
            hits.retain(|hit| matches_source(hit.source.as_deref(), filter));
            debug!(filter, before, after = hits.len(), "applied source filter");
        }

        if hits.is_empty() {
            return Ok(Answer {
                text: NO_RESULTS.to_string(),
                sources: Vec::new(),
                hits: Vec::new(),
            });
        }

        let best = hits[0].score;
        if best < threshold {
            warn!(
                best_score = best,
                threshold, "no results above the relevance threshold; answering anyway"
            );
        }

        let context = build_context(&hits);
        let text = match &self.chat {
            Some(chat) => match chat.complete(&build_prompt(&context, question)).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(model = chat.model_name(), error = %e, "chat model invocation failed");
                    format!("Chat model invocation failed: {}", e)
                }
            },
            None => context.chars().take(OFFLINE_CONTEXT_CHARS).collect(),
        };

        Ok(Answer {
            text,
            sources: hits.iter().filter_map(|h| h.source.clone()).collect(),
            hits: hits.iter().take(MAX_HIT_SUMMARIES).map(HitSummary::from).collect(),
        })
    }
}

/// Join hit texts in score order.
pub fn build_context(hits: &[Hit]) -> String {
    hits.iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "\nAnswer the question based only on the following context:\n\n{}\n\n---\n\nAnswer the question based on the above context: {}\n",
        context, question
    )
}

/// Final path component, splitting on both `/` and `\`.
fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Compare file names only, ignoring case and directories.
fn matches_source(source: Option<&str>, filter: &str) -> bool {
    match source {
        Some(source) => file_name(source).to_lowercase() == file_name(filter).to_lowercase(),
        None => false,
    }
}
