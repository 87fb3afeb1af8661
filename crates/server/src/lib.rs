pub mod latency;

use axum::{
    Router,
    extract::{Json, Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use sr_core::Config;
use sr_core::config::SearchConfig;
use sr_core::models::{Filters, SearchHit};
use sr_search::bm25::Bm25Index;
use sr_search::hybrid::{HybridQuery, HybridSearch, HybridSettings};
use sr_search::scoring::FreshnessDecay;
use sr_search::vector::{SharedVectorIndex, VectorIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Default log directives for the query server
pub const SERVER_LOG_DIRECTIVES: &str = "sr_server=info,sr_search=info,tower_http=debug";
/// Default log directives for the latency harness
pub const HARNESS_LOG_DIRECTIVES: &str = "sr_server=info,sr_search=warn";

/// Install the `fmt` subscriber on stderr. `RUST_LOG` overrides
/// `default_directives`.
pub fn init_tracing(
    default_directives: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives)),
        )
        .with_writer(std::io::stderr)
        .try_init()
}

/// Shared application state for REST server
pub struct AppState {
    pub search: HybridSearch<SharedVectorIndex>,
    pub settings: SearchConfig,
    pub decay: FreshnessDecay,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build state from configuration. The BM25 index lives on disk when a
    /// data directory is configured, in RAM otherwise.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let bm25_index = match config.data_dir() {
            Some(dir) => Bm25Index::new(dir.join("bm25"))?,
            None => Bm25Index::in_memory()?,
        };
        let vectors = SharedVectorIndex::new(VectorIndex::new(config.index.dimensions)?);

        Ok(Self {
            search: HybridSearch::new(bm25_index, vectors),
            settings: config.search.clone(),
            decay: FreshnessDecay::new(config.search.freshness_half_life_days),
        })
    }

    fn hybrid_settings(&self) -> HybridSettings {
        HybridSettings {
            weights: self.settings.weights(),
            candidate_limit: self.settings.candidate_limit,
            vector_timeout: self.settings.vector_timeout(),
        }
    }
}

/// Create an in-memory AppState for testing (4-dim vectors).
pub fn test_app_state() -> SharedState {
    let mut config = Config::default();
    config.index.dimensions = 4;
    Arc::new(AppState::from_config(&config).expect("in-memory state"))
}

/// Build the axum Router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/api/v1/documents", post(api_ingest))
        .route("/api/v1/documents/{doc_id}", delete(api_delete))
        .route("/api/v1/stats", get(api_stats))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// --- Request / Response types ---

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Precomputed query embedding; omitted means lexical-only
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filters: Filters,
    /// Caller's overall budget; vector retrieval never outlives it
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SearchResponse {
    pub request_id: String,
    /// True when vector retrieval was attempted but unavailable
    pub vector_fallback: bool,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Echo the caller's request id, or mint one.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

// --- Handlers ---

async fn search(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    let start = Instant::now();
    let request_id = request_id(&headers);

    let limit = req.limit.unwrap_or(state.settings.default_limit);
    let deadline = req
        .timeout_ms
        .map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));
    let query = HybridQuery {
        text: &req.query,
        embedding: req.embedding.as_deref(),
        filters: &req.filters,
        limit,
        deadline,
    };

    let outcome = state.search.search(&query, &state.hybrid_settings()).await;

    let response = SearchResponse {
        request_id: request_id.clone(),
        vector_fallback: outcome.vector_fallback,
        results: outcome.documents.iter().map(SearchHit::from).collect(),
    };

    tracing::info!(
        stage = "score_finalize",
        request_id = %request_id,
        results = response.results.len(),
        vector_fallback = outcome.vector_fallback,
        latency_ms = start.elapsed().as_millis() as u64,
        "search complete"
    );

    let mut response_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response_headers.insert(REQUEST_ID_HEADER, value);
    }
    (response_headers, Json(response))
}

#[derive(Deserialize)]
pub struct ChunkInput {
    /// Defaults to `{doc_id}#{position}`
    #[serde(default)]
    pub chunk_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub doc_id: String,
    pub chunks: Vec<ChunkInput>,
    /// Explicit freshness signal; wins over `published_at`
    #[serde(default)]
    pub freshness: Option<f64>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct IngestResponse {
    pub doc_id: String,
    pub chunks: usize,
    pub vectors: usize,
    pub freshness: Option<f64>,
}

async fn api_ingest(
    State(state): State<SharedState>,
    Json(req): Json<IngestRequest>,
) -> (StatusCode, Json<ApiResponse<IngestResponse>>) {
    if req.doc_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err("doc_id must not be empty")),
        );
    }

    let dimensions = state.search.vector().dimensions();
    if let Some(bad) = req
        .chunks
        .iter()
        .filter_map(|c| c.embedding.as_ref())
        .find(|e| e.len() != dimensions)
    {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::err(format!(
                "embedding dimension mismatch: expected {dimensions}, got {}",
                bad.len()
            ))),
        );
    }

    let mut vectors = 0;
    for (position, chunk) in req.chunks.iter().enumerate() {
        let chunk_id = chunk
            .chunk_id
            .clone()
            .unwrap_or_else(|| format!("{}#{position}", req.doc_id));

        if let Err(e) = state.search.index_text(&chunk_id, &req.doc_id, &chunk.text) {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(format!("BM25 index: {e}"))),
            );
        }

        if let Some(embedding) = &chunk.embedding {
            if let Err(e) = state.search.vector().upsert(
                &chunk_id,
                &req.doc_id,
                embedding,
                chunk.metadata.clone(),
            ) {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::err(format!("Vector index: {e}"))),
                );
            }
            vectors += 1;
        }
    }

    let freshness = req.freshness.or_else(|| {
        req.published_at
            .map(|published| state.decay.score_at(published, Utc::now()))
    });
    if let Some(value) = freshness
        && let Err(e) = state.search.set_freshness(&req.doc_id, value)
    {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::err(format!("Freshness: {e}"))),
        );
    }

    tracing::debug!(doc_id = %req.doc_id, chunks = req.chunks.len(), vectors, "document ingested");

    (
        StatusCode::CREATED,
        Json(ApiResponse::ok(IngestResponse {
            doc_id: req.doc_id,
            chunks: req.chunks.len(),
            vectors,
            freshness,
        })),
    )
}

async fn api_delete(
    State(state): State<SharedState>,
    Path(doc_id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = state.search.remove_document(&doc_id) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::err(format!("BM25 index: {e}"))),
        )
            .into_response();
    }

    match state.search.vector().remove_document(&doc_id) {
        Ok(_) => Json(ApiResponse::ok("deleted")).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::err(format!("Vector index: {e}"))),
        )
            .into_response(),
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct StatsResponse {
    pub lexical_chunks: u64,
    pub vector_chunks: usize,
    pub dimensions: usize,
    pub vector_timeout_ms: u64,
}

async fn api_stats(State(state): State<SharedState>) -> Json<ApiResponse<StatsResponse>> {
    Json(ApiResponse::ok(StatsResponse {
        lexical_chunks: state.search.lexical_count(),
        vector_chunks: state.search.vector().len(),
        dimensions: state.search.vector().dimensions(),
        vector_timeout_ms: state.settings.vector_timeout_ms,
    }))
}
