//! Core data models used throughout the pipeline.
//!
//! These types represent the pages, chunks, stored records, and query
//! results that flow through ingestion and retrieval.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Text of one PDF page. Created by the loader, discarded after chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    /// Path of the PDF the page came from.
    pub source: String,
    /// Zero-based page number.
    pub page: u32,
}

/// A window over a [`Document`]'s text; the unit of embedding and storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub page: u32,
    /// Offset of the window in the page text, in characters.
    pub start_index: usize,
}

impl Chunk {
    /// Stable record id derived from the chunk's identity.
    pub fn record_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.page.to_le_bytes());
        hasher.update((self.start_index as u64).to_le_bytes());
        hasher.update(self.text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// An embedded chunk as written to the vector store.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub source: Option<String>,
    pub page: Option<u32>,
    pub start_index: usize,
}

impl EmbeddingRecord {
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.record_id(),
            text: chunk.text.clone(),
            vector,
            source: Some(chunk.source.clone()),
            page: Some(chunk.page),
            start_index: chunk.start_index,
        }
    }
}

/// A search result: stored text plus its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    #[serde(skip)]
    pub text: String,
    /// Cosine similarity with the query vector; higher is more related.
    pub score: f32,
    pub source: Option<String>,
    pub page: Option<u32>,
}

/// The `{score, source, page}` view of a [`Hit`] returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitSummary {
    pub score: f32,
    pub source: Option<String>,
    pub page: Option<u32>,
}

impl From<&Hit> for HitSummary {
    fn from(hit: &Hit) -> Self {
        Self {
            score: hit.score,
            source: hit.source.clone(),
            page: hit.page,
        }
    }
}

/// The response to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
    pub hits: Vec<HitSummary>,
}
