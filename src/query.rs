//! The `query` command: answer one question from the command line.

use std::sync::Arc;

use anyhow::Result;

use crate::answer::AnswerEngine;
use crate::chat::select_chat_model;
use crate::config::Config;
use crate::embedding::select_embedder;
use crate::store::{SqliteVectorStore, VectorStore};

/// Hits printed before the answer.
const SHOWN_HITS: usize = 5;

pub async fn run_query(
    config: &Config,
    question: &str,
    k: Option<usize>,
    threshold: Option<f32>,
    source: Option<&str>,
) -> Result<()> {
    let embedder = select_embedder(&config.embedding)?;
    let chat = select_chat_model(config)?;
    let store: Arc<dyn VectorStore> =
        Arc::new(SqliteVectorStore::open(&config.store.path, &config.store.collection).await?);
    let engine = AnswerEngine::new(embedder, chat, store);

    let k = k.unwrap_or(config.retrieval.k);
    let threshold = threshold.unwrap_or(config.retrieval.threshold);
    let source = source.or(config.retrieval.default_source.as_deref());

    let answer = engine.answer(question, k, threshold, source).await?;

    if !answer.hits.is_empty() {
        println!("Top matches:");
        for (i, hit) in answer.hits.iter().take(SHOWN_HITS).enumerate() {
            println!(
                "  {}. [{:.3}] {} (page {})",
                i + 1,
                hit.score,
                hit.source.as_deref().unwrap_or("<unknown>"),
                hit.page
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "?".to_string())
            );
        }
        if answer.hits[0].score < threshold {
            println!(
                "  Note: no match scored above the relevance threshold {:.2}; answering from the closest matches.",
                threshold
            );
        }
        println!();
    }

    println!("Response:");
    println!("{}", answer.text);

    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  {}", source);
        }
    }

    Ok(())
}
