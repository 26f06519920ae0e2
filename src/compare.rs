//! The `compare` command: embed two words and print their similarity.
//!
//! Handy for checking that an embedding provider is wired up and behaves
//! sensibly (`pdfrag compare apple iphone`).

use anyhow::Result;

use crate::config::Config;
use crate::embedding::{cosine_similarity, select_embedder};

pub async fn run_compare(config: &Config, first: &str, second: &str) -> Result<()> {
    let embedder = select_embedder(&config.embedding)?;

    let vector = embedder.embed_one(first).await?;
    println!("Vector for '{}': {} dimensions", first, vector.len());
    println!("  model: {}", embedder.model_name());

    let other = embedder.embed_one(second).await?;
    let similarity = cosine_similarity(&vector, &other);
    println!(
        "Comparing ({}, {}): cosine similarity {:.4}, distance {:.4}",
        first,
        second,
        similarity,
        1.0 - similarity
    );

    Ok(())
}
