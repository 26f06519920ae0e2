//! HTTP API for ingestion and question answering.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/`, `/health` | Status, configuration summary and vector count |
//! | `GET`  | `/debug/store` | Store location, count and a few sample records |
//! | `POST` | `/query` | Answer a question with explicit `k`, `threshold`, `source` |
//! | `POST` | `/answer` | Answer a question with the configured defaults |
//! | `POST` | `/ingest` | Append an uploaded PDF, or rebuild from the data directory |
//! | `POST` | `/ingest/upload` | Append an uploaded PDF (file required) |
//! | `GET`  | `/upload` | Minimal HTML upload form |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends on
//! other ports can call the API.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::answer::AnswerEngine;
use crate::chat::{select_chat_model, ChatModel};
use crate::config::Config;
use crate::embedding::{select_embedder, Embedder};
use crate::ingest::{ingest_path, IngestMode, IngestSummary};
use crate::loader::is_pdf;
use crate::models::{Answer, HitSummary};
use crate::store::{SqliteVectorStore, StoredRecord, VectorStore, VectorStoreManager};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    engine: Arc<AnswerEngine>,
    manager: Arc<VectorStoreManager>,
}

impl AppState {
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        chat: Option<Arc<dyn ChatModel>>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let engine = AnswerEngine::new(embedder.clone(), chat, store.clone());
        let manager = VectorStoreManager::new(store.clone(), embedder, &config.embedding);
        Self {
            config: Arc::new(config),
            store,
            engine: Arc::new(engine),
            manager: Arc::new(manager),
        }
    }
}

/// Build the router with all routes, CORS and the upload size limit.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);

    Router::new()
        .route("/", get(handle_health))
        .route("/health", get(handle_health))
        .route("/debug/store", get(handle_debug_store))
        .route("/query", post(handle_query))
        .route("/answer", post(handle_answer))
        .route("/ingest", post(handle_ingest))
        .route("/ingest/upload", post(handle_ingest_upload))
        .route("/upload", get(handle_upload_form))
        .layer(body_limit)
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Selects the providers, opens the store, ingests the data directory when
/// the store is empty, then serves on `[server].bind` until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let embedder = select_embedder(&config.embedding)?;
    let chat = select_chat_model(config)?;
    let store: Arc<dyn VectorStore> =
        Arc::new(SqliteVectorStore::open(&config.store.path, &config.store.collection).await?);

    let state = AppState::new(config.clone(), embedder, chat, store);
    auto_ingest(&state).await;

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(
        addr = %bind_addr,
        provider = %config.embedding.provider,
        "server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Rebuild from the data directory when the store is empty.
///
/// Failures are logged; the server starts regardless.
pub async fn auto_ingest(state: &AppState) {
    let count = match state.store.count().await {
        Ok(count) => count,
        Err(e) => {
            warn!(error = %e, "could not read vector store; skipping startup ingest");
            return;
        }
    };
    if count > 0 {
        info!(vectors = count, "vector store already populated");
        return;
    }

    let data_path = &state.config.data.path;
    info!(path = %data_path.display(), "vector store empty; ingesting data directory");
    match ingest_path(
        &state.manager,
        &state.config.chunking,
        data_path,
        IngestMode::Rebuild,
    )
    .await
    {
        Ok(summary) => match &summary.report {
            Some(report) if report.quota_abort.is_some() => {
                warn!(chunks_written = report.chunks_written, "startup ingest stopped on quota")
            }
            Some(report) => info!(chunks_written = report.chunks_written, "startup ingest complete"),
            None => info!("no PDF files found for startup ingest"),
        },
        Err(e) => error!(error = %format!("{:#}", e), "startup ingest failed"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (`"bad_request"` or `"internal"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("{:#}", err),
    }
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    provider: String,
    persist_directory: String,
    data_path: String,
    collection: String,
    vector_count: Option<usize>,
    store_error: Option<String>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (vector_count, store_error) = match state.store.count().await {
        Ok(n) => (Some(n), None),
        Err(e) => (None, Some(e.to_string())),
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider: state.config.embedding.provider.to_string(),
        persist_directory: state.store.location().display().to_string(),
        data_path: state.config.data.path.display().to_string(),
        collection: state.store.collection().to_string(),
        vector_count,
        store_error,
    })
}

// ============ GET /debug/store ============

#[derive(Serialize)]
struct DebugStoreResponse {
    persist_directory: String,
    collection: String,
    count: usize,
    samples: Vec<StoredRecord>,
    hint: Option<String>,
}

async fn handle_debug_store(
    State(state): State<AppState>,
) -> Result<Json<DebugStoreResponse>, AppError> {
    let count = state.store.count().await.map_err(internal)?;
    let samples = state.store.peek(3).await.map_err(internal)?;
    let hint = (count == 0).then(|| {
        format!(
            "The store is empty. Put PDFs under {} and POST /ingest, or upload one at /upload.",
            state.config.data.path.display()
        )
    });

    Ok(Json(DebugStoreResponse {
        persist_directory: state.store.location().display().to_string(),
        collection: state.store.collection().to_string(),
        count,
        samples,
        hint,
    }))
}

// ============ POST /query and /answer ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    k: Option<usize>,
    threshold: Option<f32>,
    source: Option<String>,
}

#[derive(Deserialize)]
struct AnswerRequest {
    question: String,
}

#[derive(Serialize)]
struct QueryResponse {
    response: String,
    sources: Vec<String>,
    hits: Vec<HitSummary>,
}

impl From<Answer> for QueryResponse {
    fn from(answer: Answer) -> Self {
        Self {
            response: answer.text,
            sources: answer.sources,
            hits: answer.hits,
        }
    }
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let retrieval = &state.config.retrieval;
    let answer = state
        .engine
        .answer(
            &req.question,
            req.k.unwrap_or(retrieval.k),
            req.threshold.unwrap_or(retrieval.threshold),
            req.source.as_deref(),
        )
        .await
        .map_err(internal)?;
    Ok(Json(answer.into()))
}

async fn handle_answer(
    State(state): State<AppState>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let retrieval = &state.config.retrieval;
    let answer = state
        .engine
        .answer(
            &req.question,
            retrieval.k,
            retrieval.threshold,
            retrieval.default_source.as_deref(),
        )
        .await
        .map_err(internal)?;
    Ok(Json(answer.into()))
}

// ============ POST /ingest and /ingest/upload ============

#[derive(Serialize)]
struct IngestResponse {
    /// `ok`, `skipped` (nothing to store) or `partial` (stopped on quota).
    status: &'static str,
    message: String,
    file: Option<String>,
    summary: IngestSummary,
    vector_count: usize,
}

/// With a multipart `file`: save it and append it. Without: rebuild from the
/// data directory.
async fn handle_ingest(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<IngestResponse>, AppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| bad_request(e.body_text()))?;
        if let Some(saved) = save_upload(&state, multipart).await? {
            return ingest_file(&state, saved).await;
        }
    }

    let summary = ingest_path(
        &state.manager,
        &state.config.chunking,
        &state.config.data.path,
        IngestMode::Rebuild,
    )
    .await
    .map_err(internal)?;
    Ok(Json(ingest_response(&state, summary, None).await))
}

async fn handle_ingest_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    let saved = save_upload(&state, multipart)
        .await?
        .ok_or_else(|| bad_request("multipart field 'file' is required"))?;
    ingest_file(&state, saved).await
}

async fn ingest_file(state: &AppState, path: PathBuf) -> Result<Json<IngestResponse>, AppError> {
    let summary = ingest_path(
        &state.manager,
        &state.config.chunking,
        &path,
        IngestMode::Append,
    )
    .await
    .map_err(internal)?;
    let file = path.display().to_string();
    Ok(Json(ingest_response(state, summary, Some(file)).await))
}

async fn ingest_response(
    state: &AppState,
    summary: IngestSummary,
    file: Option<String>,
) -> IngestResponse {
    let (status, message) = match &summary.report {
        None => ("skipped", "No PDF text found; store left unchanged.".to_string()),
        Some(report) => match &report.quota_abort {
            Some(diagnostic) => ("partial", diagnostic.clone()),
            None => (
                "ok",
                format!(
                    "Stored {} chunks from {} pages.",
                    report.chunks_written, summary.documents
                ),
            ),
        },
    };

    IngestResponse {
        status,
        message,
        file,
        vector_count: state.manager.count().await,
        summary,
    }
}

/// Save the `file` field under the data directory. Returns `None` when the
/// form has no `file` field.
async fn save_upload(state: &AppState, mut multipart: Multipart) -> Result<Option<PathBuf>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .and_then(sanitize_file_name)
            .ok_or_else(|| bad_request("uploaded file has no usable name"))?;
        if !is_pdf(Path::new(&file_name)) {
            return Err(bad_request(format!("only PDF files are accepted, got '{}'", file_name)));
        }

        let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
        let data_dir = &state.config.data.path;
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("Failed to create {}", data_dir.display()))
            .map_err(internal)?;

        let target = data_dir.join(&file_name);
        tokio::fs::write(&target, &bytes)
            .await
            .with_context(|| format!("Failed to save {}", target.display()))
            .map_err(internal)?;
        info!(file = %target.display(), bytes = bytes.len(), "saved upload");
        return Ok(Some(target));
    }
    Ok(None)
}

/// Reduce a client-supplied name to its final path component.
fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." {
        None
    } else {
        Some(last.to_string())
    }
}

// ============ GET /upload ============

const UPLOAD_FORM: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Upload PDF</title></head>
<body>
<h1>Upload a PDF</h1>
<form action="/ingest/upload" method="post" enctype="multipart/form-data">
  <input type="file" name="file" accept="application/pdf,.pdf" required>
  <button type="submit">Upload and ingest</button>
</form>
</body>
</html>
"#;

async fn handle_upload_form() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}
