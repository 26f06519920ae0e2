//! # PDF RAG
//!
//! Question answering over a folder of PDFs.
//!
//! PDFs are split into per-page documents, cut into overlapping character
//! windows, embedded with a local or cloud model, and stored in a SQLite
//! vector store. Questions are embedded the same way, matched by cosine
//! similarity, and answered by a chat model restricted to the retrieved
//! context, or by the raw context when running fully offline.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────────┐   ┌──────────┐
//! │  Loader  │──▶│ Chunker  │──▶│ Store Manager │──▶│  SQLite  │
//! │ PDF→page │   │ windows  │   │ embed+retry   │   │ vectors  │
//! └──────────┘   └──────────┘   └───────────────┘   └────┬─────┘
//!                                                        │
//!                                 ┌──────────────────────┤
//!                                 ▼                      ▼
//!                          ┌──────────────┐        ┌──────────┐
//!                          │ AnswerEngine │◀──────▶│ CLI/HTTP │
//!                          │  chat model  │        │          │
//!                          └──────────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! EMBEDDING_PROVIDER=LOCAL pdfrag ingest --data ./papers
//! EMBEDDING_PROVIDER=LOCAL pdfrag query "What is the main result?"
//! pdfrag serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`error`] | Typed configuration and provider errors |
//! | [`models`] | Core data types |
//! | [`loader`] | PDF discovery and page extraction |
//! | [`chunk`] | Overlapping character windows |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`chat`] | Chat model abstraction |
//! | [`store`] | Vector store and batched ingest |
//! | [`answer`] | Retrieval and answer generation |
//! | [`ingest`] | Load → split → store orchestration |
//! | [`server`] | HTTP API |

pub mod answer;
pub mod chat;
pub mod chunk;
pub mod compare;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod models;
pub mod query;
pub mod server;
pub mod stats;
pub mod store;
