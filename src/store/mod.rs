//! Vector storage for embedded chunks.
//!
//! The [`VectorStore`] trait is the seam between the ingest/answer pipeline
//! and persistence. [`SqliteVectorStore`] is the shipped implementation: a
//! single SQLite file under the persist directory, searched by brute-force
//! cosine similarity. [`VectorStoreManager`] layers batching, embedding, and
//! retry on top of any store.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`insert`](VectorStore::insert) | Persist a batch of records atomically |
//! | [`search`](VectorStore::search) | Top-`k` records by cosine similarity |
//! | [`count`](VectorStore::count) | Number of records in the collection |
//! | [`wipe`](VectorStore::wipe) | Empty the collection, deleting the persist directory when nothing else lives there |
//! | [`peek`](VectorStore::peek) | First few records, for diagnostics |
//! | [`source_counts`](VectorStore::source_counts) | Records per source file |

mod manager;
mod sqlite;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{EmbeddingRecord, Hit};

pub use manager::{IngestReport, RetryPolicy, VectorStoreManager};
pub use sqlite::{SqliteVectorStore, DATABASE_FILE};

/// Identity and metadata of a stored record, without text or vector.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub id: String,
    pub source: Option<String>,
    pub page: Option<u32>,
    pub start_index: usize,
}

/// Number of records stored for one source file.
#[derive(Debug, Clone, Serialize)]
pub struct SourceCount {
    pub source: Option<String>,
    pub chunks: usize,
}

/// Persistent collection of embedding records.
///
/// Implementations must be `Send + Sync`; the server shares one store across
/// request handlers.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Collection name records are stored under.
    fn collection(&self) -> &str;

    /// Persist directory.
    fn location(&self) -> &Path;

    /// Insert records. Either all of them are persisted or none are.
    async fn insert(&self, records: &[EmbeddingRecord]) -> Result<()>;

    /// Return up to `k` hits ordered by descending similarity to `query`.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>>;

    async fn count(&self) -> Result<usize>;

    /// Remove every record of this collection and reopen empty.
    ///
    /// The persist directory itself is deleted unless other collections still
    /// have records in it. The store stays usable even when this fails.
    async fn wipe(&self) -> Result<()>;

    /// Up to `limit` records in insertion order.
    async fn peek(&self, limit: usize) -> Result<Vec<StoredRecord>>;

    /// Record counts grouped by source, largest first.
    async fn source_counts(&self) -> Result<Vec<SourceCount>>;
}
