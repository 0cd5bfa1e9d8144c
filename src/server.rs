//! HTTP transport over the core pipeline.
//!
//! A thin JSON shim: `POST /ingest`, `POST /query`, `GET /health`. Core
//! errors map to an error envelope with a machine-readable code and the
//! original cause text; one bad URL or query never takes the process down.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::error::Error;
use crate::ingest::Pipeline;
use crate::models::SearchResult;

pub async fn run_server(pipeline: Pipeline) -> anyhow::Result<()> {
    let bind_addr = pipeline.config().server.bind.clone();
    let state = Arc::new(pipeline);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!(%bind_addr, "server listening");
    println!("recollect listening on http://{bind_addr}");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error envelope ============

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            Error::Fetch(_) => (StatusCode::BAD_REQUEST, "fetch_failed"),
            Error::ContentTooShort { .. } => (StatusCode::BAD_REQUEST, "content_too_short"),
            Error::Config(_) => (StatusCode::BAD_REQUEST, "invalid_config"),
            Error::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "timeout"),
            Error::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_failed"),
            Error::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        };
        let body = ErrorBody {
            ok: false,
            error: ErrorDetail {
                code,
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    url: String,
}

#[derive(Serialize)]
struct IngestResponse {
    ok: bool,
    source_id: i64,
}

async fn handle_ingest(
    State(pipeline): State<Arc<Pipeline>>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let source_id = pipeline.ingest(&req.url).await.map_err(AppError)?;
    Ok(Json(IngestResponse {
        ok: true,
        source_id,
    }))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: i64,
}

fn default_top_k() -> i64 {
    5
}

#[derive(Serialize)]
struct QueryResponse {
    ok: bool,
    results: Vec<SearchResult>,
}

async fn handle_query(
    State(pipeline): State<Arc<Pipeline>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let results = pipeline.query(&req.query, req.top_k).await.map_err(AppError)?;
    Ok(Json(QueryResponse { ok: true, results }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}
