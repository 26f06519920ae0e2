//! SQLite-backed [`VectorStore`].
//!
//! Records live in one `embeddings` table inside `<persist dir>/vectors.sqlite3`.
//! Vectors are stored as little-endian `f32` BLOBs and scored in process, so
//! search cost is linear in the collection size.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{SourceCount, StoredRecord, VectorStore};
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{EmbeddingRecord, Hit};

/// File name of the database inside the persist directory.
pub const DATABASE_FILE: &str = "vectors.sqlite3";

/// SQLite implementation of [`VectorStore`].
///
/// The pool sits behind a [`RwLock`]: normal operations share it, while
/// [`wipe`](VectorStore::wipe) takes it exclusively so it can close the pool
/// before deleting the directory.
///
/// Several collections may share one persist directory. Wiping a collection
/// deletes the directory only when no other collection has records in it;
/// otherwise just that collection's rows are removed.
pub struct SqliteVectorStore {
    dir: PathBuf,
    collection: String,
    pool: RwLock<SqlitePool>,
}

impl SqliteVectorStore {
    /// Open (creating if needed) the store under `dir`.
    pub async fn open(dir: &Path, collection: &str) -> Result<Self> {
        let pool = connect(dir).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
            collection: collection.to_string(),
            pool: RwLock::new(pool),
        })
    }

    /// Full path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.dir.join(DATABASE_FILE)
    }
}

async fn connect(dir: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create store directory {}", dir.display()))?;

    let db_path = dir.join(DATABASE_FILE);
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open vector store {}", db_path.display()))?;

    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    // `id` is not unique; appending the same chunk twice stores two records.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL,
            collection TEXT NOT NULL,
            text TEXT NOT NULL,
            source TEXT,
            page INTEGER,
            start_index INTEGER NOT NULL,
            vector BLOB NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_embeddings_collection ON embeddings(collection)")
        .execute(pool)
        .await?;

    Ok(())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn location(&self) -> &Path {
        &self.dir
    }

    async fn insert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let pool = self.pool.read().await;
        let mut tx = pool.begin().await?;
        let now = chrono::Utc::now().timestamp();

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO embeddings (id, collection, text, source, page, start_index, vector, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.id)
            .bind(&self.collection)
            .bind(&record.text)
            .bind(&record.source)
            .bind(record.page.map(i64::from))
            .bind(record.start_index as i64)
            .bind(vec_to_blob(&record.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(records = records.len(), collection = %self.collection, "inserted records");
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let pool = self.pool.read().await;
        let rows = sqlx::query(
            "SELECT text, source, page, vector FROM embeddings WHERE collection = ? ORDER BY seq",
        )
        .bind(&self.collection)
        .fetch_all(&*pool)
        .await?;

        let mut hits: Vec<Hit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                let page: Option<i64> = row.get("page");
                Hit {
                    text: row.get("text"),
                    score: cosine_similarity(query, &blob_to_vec(&blob)),
                    source: row.get("source"),
                    page: page.map(|p| p as u32),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let pool = self.pool.read().await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&*pool)
            .await?;
        Ok(count as usize)
    }

    async fn wipe(&self) -> Result<()> {
        let mut pool = self.pool.write().await;

        // Records of other collections keep the file alive.
        let others: i64 =
            match sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE collection <> ?")
                .bind(&self.collection)
                .fetch_one(&*pool)
                .await
            {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "could not inspect store before wipe; deleting directory");
                    0
                }
            };
        if others > 0 {
            sqlx::query("DELETE FROM embeddings WHERE collection = ?")
                .bind(&self.collection)
                .execute(&*pool)
                .await?;
            info!(
                dir = %self.dir.display(),
                collection = %self.collection,
                "collection wiped; other collections kept"
            );
            return Ok(());
        }

        pool.close().await;
        let removed = match std::fs::remove_dir_all(&self.dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };

        // Reopen before reporting a failed delete so the store stays usable.
        *pool = connect(&self.dir).await?;
        removed.with_context(|| format!("Failed to delete store directory {}", self.dir.display()))?;

        info!(dir = %self.dir.display(), "vector store wiped");
        Ok(())
    }

    async fn peek(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        let pool = self.pool.read().await;
        let rows = sqlx::query(
            "SELECT id, source, page, start_index FROM embeddings WHERE collection = ? ORDER BY seq LIMIT ?",
        )
        .bind(&self.collection)
        .bind(limit as i64)
        .fetch_all(&*pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let page: Option<i64> = row.get("page");
                let start_index: i64 = row.get("start_index");
                StoredRecord {
                    id: row.get("id"),
                    source: row.get("source"),
                    page: page.map(|p| p as u32),
                    start_index: start_index as usize,
                }
            })
            .collect())
    }

    async fn source_counts(&self) -> Result<Vec<SourceCount>> {
        let pool = self.pool.read().await;
        let rows = sqlx::query(
            r#"
            SELECT source, COUNT(*) AS chunks
            FROM embeddings
            WHERE collection = ?
            GROUP BY source
            ORDER BY chunks DESC, source
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&*pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                SourceCount {
                    source: row.get("source"),
                    chunks: chunks as usize,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(text: &str, source: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: format!("id-{}", text),
            text: text.to_string(),
            vector,
            source: Some(source.to_string()),
            page: Some(0),
            start_index: 0,
        }
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&tmp.path().join("store"), "documents")
            .await
            .unwrap();
        store
            .insert(&[
                record("far", "b.pdf", vec![0.0, 1.0]),
                record("near", "a.pdf", vec![1.0, 0.1]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "near");
        assert!(hits[0].score > hits[1].score);

        assert_eq!(store.search(&[1.0, 0.0], 1).await.unwrap().len(), 1);
        assert!(store.search(&[1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("store");
        let docs = SqliteVectorStore::open(&dir, "documents").await.unwrap();
        let other = SqliteVectorStore::open(&dir, "other").await.unwrap();

        docs.insert(&[record("x", "a.pdf", vec![1.0])]).await.unwrap();
        assert_eq!(docs.count().await.unwrap(), 1);
        assert_eq!(other.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wipe_removes_records_and_reopens() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("store");
        let store = SqliteVectorStore::open(&dir, "documents").await.unwrap();
        store
            .insert(&[record("x", "a.pdf", vec![1.0]), record("y", "a.pdf", vec![0.5])])
            .await
            .unwrap();

        store.wipe().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.database_path().exists());

        store.insert(&[record("z", "b.pdf", vec![1.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn wipe_keeps_other_collections() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("store");
        let docs = SqliteVectorStore::open(&dir, "documents").await.unwrap();
        let other = SqliteVectorStore::open(&dir, "other").await.unwrap();
        docs.insert(&[record("x", "a.pdf", vec![1.0])]).await.unwrap();
        other
            .insert(&[record("y", "b.pdf", vec![1.0]), record("z", "b.pdf", vec![1.0])])
            .await
            .unwrap();

        docs.wipe().await.unwrap();

        assert_eq!(docs.count().await.unwrap(), 0);
        assert_eq!(other.count().await.unwrap(), 2);
        docs.insert(&[record("w", "c.pdf", vec![1.0])]).await.unwrap();
        assert_eq!(docs.count().await.unwrap(), 1);
        assert_eq!(other.count().await.unwrap(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_wipe_leaves_store_usable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("locked");
        std::fs::create_dir_all(&parent).unwrap();
        let dir = parent.join("store");
        let store = SqliteVectorStore::open(&dir, "documents").await.unwrap();
        store.insert(&[record("x", "a.pdf", vec![1.0])]).await.unwrap();

        // Without write access to the parent the directory itself cannot be removed.
        std::fs::set_permissions(&parent, std::fs::Permissions::from_mode(0o555)).unwrap();
        let writable = std::fs::write(parent.join("write-check"), b"").is_ok();
        let result = store.wipe().await;
        std::fs::set_permissions(&parent, std::fs::Permissions::from_mode(0o755)).unwrap();

        if writable {
            // Permissions are not enforced (running as root); the wipe succeeds.
            result.unwrap();
        } else {
            assert!(result.is_err());
        }
        assert_eq!(store.count().await.unwrap(), 0);
        store.insert(&[record("y", "a.pdf", vec![1.0])]).await.unwrap();
        assert_eq!(store.search(&[1.0], 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn peek_and_source_counts() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(tmp.path(), "documents").await.unwrap();
        store
            .insert(&[
                record("1", "a.pdf", vec![1.0]),
                record("2", "b.pdf", vec![1.0]),
                record("3", "b.pdf", vec![1.0]),
            ])
            .await
            .unwrap();

        let sample = store.peek(2).await.unwrap();
        assert_eq!(sample.len(), 2);
        assert_eq!(sample[0].id, "id-1");

        let counts = store.source_counts().await.unwrap();
        assert_eq!(counts[0].source.as_deref(), Some("b.pdf"));
        assert_eq!(counts[0].chunks, 2);
        assert_eq!(counts[1].chunks, 1);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("store");
        {
            let store = SqliteVectorStore::open(&dir, "documents").await.unwrap();
            store.insert(&[record("x", "a.pdf", vec![1.0])]).await.unwrap();
        }
        let reopened = SqliteVectorStore::open(&dir, "documents").await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
