//! Vector store statistics.
//!
//! Provides a quick summary of what's indexed: store location and size,
//! vector count, and a per-source breakdown. Used by `pdfrag stats` to check
//! that ingest did what was expected.

use std::path::Path;

use anyhow::Result;
use walkdir::WalkDir;

use crate::config::Config;
use crate::store::{SqliteVectorStore, VectorStore};

/// Run the stats command: open the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteVectorStore::open(&config.store.path, &config.store.collection).await?;

    let total = store.count().await?;
    let sources = store.source_counts().await?;
    let size = dir_size(store.location());

    println!("PDF RAG: Vector Store Stats");
    println!("==========================");
    println!();
    println!("  Store:       {}", store.location().display());
    println!("  Collection:  {}", store.collection());
    println!("  Size:        {}", format_bytes(size));
    println!("  Provider:    {}", config.embedding.provider);
    println!();
    println!("  Vectors:     {}", total);

    if !sources.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<56} {:>8}", "SOURCE", "CHUNKS");
        println!("  {}", "-".repeat(65));
        for s in &sources {
            println!(
                "  {:<56} {:>8}",
                s.source.as_deref().unwrap_or("<none>"),
                s.chunks
            );
        }
    }

    println!();
    Ok(())
}

/// Total size of all files under `dir`, including SQLite WAL files.
fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_byte_sizes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn missing_dir_has_zero_size() {
        assert_eq!(dir_size(Path::new("/definitely/not/here")), 0);
    }
}
