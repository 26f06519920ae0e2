//! # PDF RAG CLI (`pdfrag`)
//!
//! ## Usage
//!
//! ```bash
//! pdfrag [--config ./pdfrag.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfrag ingest` | Rebuild the vector store from the data directory |
//! | `pdfrag ingest --append` | Add PDFs to the existing store |
//! | `pdfrag query "<question>"` | Answer a question from the store |
//! | `pdfrag serve` | Start the HTTP API |
//! | `pdfrag stats` | Show store size and per-source counts |
//! | `pdfrag compare <a> <b>` | Embed two words and print their similarity |
//!
//! Settings come from the optional TOML file, then from environment
//! variables (a `.env` file in the working directory is read first).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pdf_rag::{compare, config, ingest, logging, query, server, stats};

/// PDF RAG: question answering over a folder of PDFs.
#[derive(Parser)]
#[command(
    name = "pdfrag",
    about = "PDF RAG: question answering over a folder of PDFs",
    version,
    long_about = "Loads PDFs into a local vector store using a local, Google or OpenAI embedding \
    model, then answers questions from the retrieved passages via the CLI or an HTTP API."
)]
struct Cli {
    /// Path to a TOML configuration file.
    ///
    /// Optional; without it the defaults and environment variables are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load PDFs, split them, and store their embeddings.
    ///
    /// Rebuilds the store from scratch unless `--append` is given. When no
    /// PDF text is found, the store is not created or modified.
    Ingest {
        /// Add to the existing store instead of rebuilding it.
        #[arg(long)]
        append: bool,

        /// Directory (or single PDF) to ingest. Defaults to `[data].path`.
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Answer a question from the stored PDFs.
    Query {
        /// The question.
        text: String,

        /// Number of passages to retrieve.
        #[arg(long)]
        k: Option<usize>,

        /// Relevance threshold below which a note is printed.
        #[arg(long)]
        threshold: Option<f32>,

        /// Only use passages from this PDF file name.
        #[arg(long)]
        source: Option<String>,
    },

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` (or `BIND_ADDR`). Ingests the data directory
    /// first when the store is empty.
    Serve,

    /// Show vector store statistics.
    Stats,

    /// Embed two words and print their cosine similarity.
    Compare {
        first: String,
        second: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cfg = config::Config::load(cli.config.as_deref())?;
    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Ingest { append, data } => {
            ingest::run_ingest(&cfg, data.as_deref(), append).await?;
        }
        Commands::Query {
            text,
            k,
            threshold,
            source,
        } => {
            query::run_query(&cfg, &text, k, threshold, source.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Compare { first, second } => {
            compare::run_compare(&cfg, &first, &second).await?;
        }
    }

    Ok(())
}
