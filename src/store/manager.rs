//! Batched, retrying writes into a [`VectorStore`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::VectorStore;
use crate::config::EmbeddingConfig;
use crate::embedding::Embedder;
use crate::error::is_quota_error;
use crate::models::{Chunk, EmbeddingRecord};

/// Per-batch retry schedule. The delay after failed attempt `n` (0-based) is
/// `base_delay * 2^n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.backoff_ms),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Outcome of a rebuild or append.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestReport {
    pub chunks_total: usize,
    pub chunks_written: usize,
    pub batches_written: usize,
    /// Set when the embedding provider ran out of quota and the run stopped
    /// early. Batches written before that point are kept.
    pub quota_abort: Option<String>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.quota_abort.is_none() && self.chunks_written == self.chunks_total
    }
}

/// Embeds chunks and writes them to a store.
///
/// Writes through one manager are serialized: a rebuild holds the write lock
/// from the wipe until its last batch, so an overlapping rebuild or append
/// waits for it instead of interleaving.
pub struct VectorStoreManager {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    retry: RetryPolicy,
    write_lock: Mutex<()>,
}

impl VectorStoreManager {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: &EmbeddingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            batch_size: config.batch_size.max(1),
            retry: RetryPolicy::from_config(config),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Wipe the store, then append `chunks`.
    pub async fn rebuild(&self, chunks: &[Chunk]) -> Result<IngestReport> {
        let _guard = self.write_lock.lock().await;
        info!(dir = %self.store.location().display(), "rebuilding vector store");
        self.store.wipe().await?;
        self.write_chunks(chunks).await
    }

    /// Embed and insert `chunks` batch by batch.
    ///
    /// Quota exhaustion stops the run without an error and is reported in
    /// [`IngestReport::quota_abort`]. Any other failure is retried per
    /// [`RetryPolicy`]; once a batch runs out of attempts the error is
    /// returned.
    pub async fn append(&self, chunks: &[Chunk]) -> Result<IngestReport> {
        let _guard = self.write_lock.lock().await;
        self.write_chunks(chunks).await
    }

    async fn write_chunks(&self, chunks: &[Chunk]) -> Result<IngestReport> {
        let mut report = IngestReport {
            chunks_total: chunks.len(),
            ..IngestReport::default()
        };
        if chunks.is_empty() {
            return Ok(report);
        }

        let total_batches = chunks.len().div_ceil(self.batch_size);
        let max_attempts = self.retry.max_attempts.max(1);

        for (index, batch) in chunks.chunks(self.batch_size).enumerate() {
            let batch_number = index + 1;
            let mut attempt = 0;

            loop {
                match self.write_batch(batch).await {
                    Ok(()) => break,
                    Err(e) if is_quota_error(&e) => {
                        warn!(
                            batch = batch_number,
                            total_batches,
                            error = %e,
                            "embedding quota exhausted, stopping ingest"
                        );
                        report.quota_abort = Some(quota_diagnostic(&e, &report, total_batches));
                        return Ok(report);
                    }
                    Err(e) => {
                        attempt += 1;
                        if attempt >= max_attempts {
                            return Err(e.context(format!(
                                "Failed to ingest batch {} of {} after {} attempts",
                                batch_number, total_batches, attempt
                            )));
                        }
                        let delay = self.retry.delay(attempt - 1);
                        warn!(
                            batch = batch_number,
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "batch failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }

            report.chunks_written += batch.len();
            report.batches_written += 1;
            info!(
                batch = batch_number,
                total_batches,
                chunks_written = report.chunks_written,
                "batch stored"
            );
        }

        Ok(report)
    }

    /// Number of stored records, or 0 if the store cannot be read.
    pub async fn count(&self) -> usize {
        match self.store.count().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "could not count vector store records");
                0
            }
        }
    }

    async fn write_batch(&self, batch: &[Chunk]) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_many(&texts).await?;
        if vectors.len() != batch.len() {
            bail!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            );
        }

        let records: Vec<EmbeddingRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector))
            .collect();
        self.store.insert(&records).await
    }
}

fn quota_diagnostic(err: &anyhow::Error, report: &IngestReport, total_batches: usize) -> String {
    format!(
        "Embedding quota exceeded ({}). Stored {} of {} batches before stopping. \
         Set EMBEDDING_PROVIDER=LOCAL to embed offline, or retry after the provider quota resets.",
        err, report.batches_written, total_batches
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay(0), Duration::from_secs(1));
        assert_eq!(retry.delay(1), Duration::from_secs(2));
        assert_eq!(retry.delay(2), Duration::from_secs(4));
    }

    #[test]
    fn report_completeness() {
        let mut report = IngestReport {
            chunks_total: 3,
            chunks_written: 3,
            batches_written: 1,
            quota_abort: None,
        };
        assert!(report.is_complete());
        report.quota_abort = Some("quota".into());
        assert!(!report.is_complete());
    }

    #[test]
    fn diagnostic_suggests_local_provider() {
        let err = anyhow::anyhow!("429 Too Many Requests");
        let report = IngestReport::default();
        let message = quota_diagnostic(&err, &report, 2);
        assert!(message.contains("EMBEDDING_PROVIDER=LOCAL"));
        assert!(message.contains("0 of 2 batches"));
    }
}
