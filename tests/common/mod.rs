//! Deterministic providers shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use pdf_rag::chat::ChatModel;
use pdf_rag::embedding::Embedder;
use pdf_rag::error::ProviderError;
use pdf_rag::models::{Chunk, EmbeddingRecord};
use pdf_rag::store::{SqliteVectorStore, VectorStore};

/// A PDF with one text line per page, built with lopdf.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id =
            doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Returns the same unit vector for every text.
pub struct FixedEmbedder {
    pub vector: Vec<f32>,
}

impl FixedEmbedder {
    pub fn unit_x() -> Arc<Self> {
        Arc::new(Self {
            vector: vec![1.0, 0.0],
        })
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }
}

/// Sleeps before answering, so concurrent writers overlap.
pub struct SlowEmbedder {
    pub delay: std::time::Duration,
}

#[async_trait]
impl Embedder for SlowEmbedder {
    fn model_name(&self) -> &str {
        "slow"
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(self.delay).await;
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Fails with a quota error from call number `fail_from` (1-based) onward.
pub struct QuotaEmbedder {
    pub fail_from: usize,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Embedder for QuotaEmbedder {
    fn model_name(&self) -> &str {
        "quota"
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_from {
            return Err(ProviderError::QuotaExceeded {
                provider: "Test",
                message: "insufficient_quota".to_string(),
            }
            .into());
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Fails the first `failures` calls with a transient error, then succeeds.
pub struct FlakyEmbedder {
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "flaky"
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            anyhow::bail!("connection reset by peer");
        }
        Ok(texts.iter().map(|_| vec![0.0, 1.0]).collect())
    }
}

/// Records every prompt and answers with a fixed string.
#[derive(Default)]
pub struct RecordingChat {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatModel for RecordingChat {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("Paris".to_string())
    }
}

pub struct FailingChat;

#[async_trait]
impl ChatModel for FailingChat {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("model overloaded")
    }
}

pub async fn open_store(dir: &Path) -> Arc<dyn VectorStore> {
    Arc::new(SqliteVectorStore::open(dir, "documents").await.unwrap())
}

pub fn chunk(text: &str, source: &str, start_index: usize) -> Chunk {
    Chunk {
        text: text.to_string(),
        source: source.to_string(),
        page: 0,
        start_index,
    }
}

pub fn chunks(n: usize, source: &str) -> Vec<Chunk> {
    (0..n)
        .map(|i| chunk(&format!("chunk number {}", i), source, i * 500))
        .collect()
}

/// A record whose vector has cosine similarity `score` with `[1, 0]`.
pub fn scored_record(text: &str, source: &str, page: u32, score: f32) -> EmbeddingRecord {
    EmbeddingRecord {
        id: format!("{}-{}", source, text.len()),
        text: text.to_string(),
        vector: vec![score, (1.0 - score * score).sqrt()],
        source: Some(source.to_string()),
        page: Some(page),
        start_index: 0,
    }
}
