//! Ingestion pipeline orchestration.
//!
//! Coordinates the write path: loader → chunker → embedding → storage.
//! Shared by `pdfrag ingest`, the HTTP `/ingest` routes, and the server's
//! startup auto-ingest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::chunk::split_with;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::select_embedder;
use crate::loader::load_documents;
use crate::models::Chunk;
use crate::store::{IngestReport, SqliteVectorStore, VectorStore, VectorStoreManager};

/// Whether ingest starts from an empty store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    Rebuild,
    Append,
}

/// Chunks produced from a path, not yet embedded.
#[derive(Debug)]
pub struct PreparedChunks {
    pub path: PathBuf,
    pub pdf_files: usize,
    pub documents: usize,
    pub failed_files: Vec<String>,
    pub chunks: Vec<Chunk>,
}

/// What an ingest run found and stored.
#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub path: PathBuf,
    pub mode: IngestMode,
    pub pdf_files: usize,
    pub documents: usize,
    pub failed_files: Vec<String>,
    pub chunks: usize,
    /// `None` when there was nothing to store and the store was left alone.
    pub report: Option<IngestReport>,
    #[serde(skip)]
    pub sample: Option<Chunk>,
}

impl IngestSummary {
    /// True when no chunks were produced, so the store was not touched.
    pub fn skipped(&self) -> bool {
        self.report.is_none()
    }
}

/// Load every PDF under `path` and split the pages into chunks.
pub async fn prepare(path: &Path, chunking: &ChunkingConfig) -> Result<PreparedChunks> {
    let root = path.to_path_buf();
    let load = tokio::task::spawn_blocking(move || load_documents(&root)).await?;

    let chunks = split_with(&load.documents, chunking.chunk_size, chunking.chunk_overlap);
    info!(
        path = %path.display(),
        documents = load.documents.len(),
        chunks = chunks.len(),
        "split documents into chunks"
    );

    Ok(PreparedChunks {
        path: path.to_path_buf(),
        pdf_files: load.pdf_files,
        documents: load.documents.len(),
        failed_files: load
            .failures
            .iter()
            .map(|f| f.path.display().to_string())
            .collect(),
        chunks,
    })
}

/// Embed and store prepared chunks.
///
/// With no chunks the store is left untouched, even in
/// [`IngestMode::Rebuild`].
pub async fn store_chunks(
    manager: &VectorStoreManager,
    prepared: PreparedChunks,
    mode: IngestMode,
) -> Result<IngestSummary> {
    let report = if prepared.chunks.is_empty() {
        info!(path = %prepared.path.display(), "nothing to store");
        None
    } else {
        Some(match mode {
            IngestMode::Rebuild => manager.rebuild(&prepared.chunks).await?,
            IngestMode::Append => manager.append(&prepared.chunks).await?,
        })
    };

    Ok(IngestSummary {
        path: prepared.path,
        mode,
        pdf_files: prepared.pdf_files,
        documents: prepared.documents,
        failed_files: prepared.failed_files,
        chunks: prepared.chunks.len(),
        report,
        sample: prepared.chunks.into_iter().next(),
    })
}

/// [`prepare`] then [`store_chunks`].
pub async fn ingest_path(
    manager: &VectorStoreManager,
    chunking: &ChunkingConfig,
    path: &Path,
    mode: IngestMode,
) -> Result<IngestSummary> {
    let prepared = prepare(path, chunking).await?;
    store_chunks(manager, prepared, mode).await
}

/// Run the `ingest` command.
///
/// Providers and the store are only opened once there is something to
/// store, so an empty data directory never creates a store.
pub async fn run_ingest(config: &Config, data: Option<&Path>, append: bool) -> Result<()> {
    let path = data.unwrap_or(config.data.path.as_path());
    let mode = if append {
        IngestMode::Append
    } else {
        IngestMode::Rebuild
    };

    let prepared = prepare(path, &config.chunking).await?;
    for failed in &prepared.failed_files {
        println!("  skipped unreadable PDF: {}", failed);
    }
    if prepared.chunks.is_empty() {
        if prepared.pdf_files == 0 {
            println!("No PDF files found.");
        } else {
            println!("No text extracted from {} PDF file(s).", prepared.pdf_files);
        }
        return Ok(());
    }

    let embedder = select_embedder(&config.embedding)?;
    let store: Arc<dyn VectorStore> =
        Arc::new(SqliteVectorStore::open(&config.store.path, &config.store.collection).await?);
    let manager = VectorStoreManager::new(store, embedder, &config.embedding);

    let summary = store_chunks(&manager, prepared, mode).await?;

    println!("ingest {}", if append { "(append)" } else { "(rebuild)" });
    println!("  path: {}", summary.path.display());
    println!("  pdf files: {}", summary.pdf_files);
    println!("  pages: {}", summary.documents);
    println!("  chunks: {}", summary.chunks);
    if let Some(sample) = &summary.sample {
        let preview: String = sample.text.chars().take(200).collect();
        println!("  sample chunk ({} p.{}):", sample.source, sample.page);
        println!("    {}", preview.replace('\n', " "));
    }
    if let Some(report) = &summary.report {
        println!(
            "  stored: {} chunks in {} batches",
            report.chunks_written, report.batches_written
        );
        if let Some(diagnostic) = &report.quota_abort {
            println!();
            println!("{}", diagnostic);
        }
    }
    println!("  vectors in store: {}", manager.count().await);

    Ok(())
}
