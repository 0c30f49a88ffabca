//! # HTTP Gateway Module
//!
//! Exposes one configured [`VectorStore`] over HTTP/JSON so services that do
//! not link the crate can use it. The server uses Axum; every store call is
//! blocking and runs on Tokio's blocking pool.
//!
//! # API Endpoints
//!
//! ## Health Check
//! - `GET /health` - Server health status and backend name
//!
//! ## Vector Operations
//! - `POST /vectors` - Insert a vector (id generated when absent)
//! - `GET /vectors/{id}` - Read a vector
//! - `PUT /vectors/{id}` - Overwrite a vector
//! - `DELETE /vectors/{id}` - Delete a vector
//!
//! ## Batch Operations
//! Kept outside `/vectors/` so every id is addressable there.
//! - `POST /batch/vectors` - Insert several vectors
//! - `PUT /batch/vectors` - Overwrite several vectors
//! - `POST /batch/delete` - Delete several vectors by id
//!
//! ## Search
//! - `POST /search` - Nearest neighbours of an embedding
//!
//! ```bash
//! curl -X POST http://localhost:3001/search \
//!      -H 'Content-Type: application/json' \
//!      -d '{"embedding": [2.0, 2.0, 1.0], "k": 3}'
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use vectorbridge::{open_store, start_server, QdrantConfig, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::Qdrant(QdrantConfig {
//!         collection: "documents".to_string(),
//!         vector_size: Some(3),
//!         ..QdrantConfig::default()
//!     });
//!     let store = tokio::task::spawn_blocking(move || open_store(config)).await??;
//!     start_server(store, "127.0.0.1", 3001).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::{VectorStoreError, VectorStoreResult};
use crate::store::VectorStore;
use crate::vector::{Metadata, Vector, VectorDistance};

const DEFAULT_K: usize = 10;

// Request/Response types
#[derive(Debug, Deserialize)]
pub struct VectorPayload {
    pub id: Option<String>,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub metadata: Option<Metadata>,
}

impl VectorPayload {
    fn into_vector(self) -> VectorStoreResult<Vector> {
        Vector::from_parts(self.id, self.embedding, self.metadata)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateVectorRequest {
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub vectors: Vec<VectorPayload>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteVectorsRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct VectorResponse {
    pub vector: Vector,
}

#[derive(Debug, Serialize)]
pub struct VectorsResponse {
    pub vectors: Vec<Vector>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<VectorDistance>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Errors a handler can answer with.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] VectorStoreError),

    #[error("vector '{id}' not found")]
    VectorNotFound { id: String },

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Store(e) => e.status_code(),
            ApiError::VectorNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse { message: self.to_string() });
        (status, body).into_response()
    }
}

// App state
pub type AppState = Arc<dyn VectorStore>;

/// Run a blocking store call off the async workers.
async fn run<T, F>(state: &AppState, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn VectorStore) -> VectorStoreResult<T> + Send + 'static,
{
    let store = Arc::clone(state);
    Ok(tokio::task::spawn_blocking(move || call(store.as_ref())).await??)
}

// Handlers
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "vectorbridge",
        "backend": state.backend(),
        "distance_function": state.distance_function(),
    }))
}

async fn insert_vector(
    State(state): State<AppState>,
    Json(payload): Json<VectorPayload>,
) -> Result<Json<VectorResponse>, ApiError> {
    let vector = payload.into_vector()?;
    let vector = run(&state, move |store| store.insert_vector(vector)).await?;
    info!("Inserted vector {}", vector.id().unwrap_or_default());
    Ok(Json(VectorResponse { vector }))
}

async fn insert_vectors(
    State(state): State<AppState>,
    Json(payload): Json<BatchRequest>,
) -> Result<Json<VectorsResponse>, ApiError> {
    let vectors = payload
        .vectors
        .into_iter()
        .map(VectorPayload::into_vector)
        .collect::<VectorStoreResult<Vec<_>>>()?;
    let vectors = run(&state, move |store| store.insert_vectors(vectors)).await?;
    info!("Inserted {} vectors", vectors.len());
    Ok(Json(VectorsResponse { vectors }))
}

async fn get_vector(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VectorResponse>, ApiError> {
    let lookup = id.clone();
    let vector = run(&state, move |store| store.read_vector(&lookup))
        .await?
        .ok_or(ApiError::VectorNotFound { id })?;
    Ok(Json(VectorResponse { vector }))
}

async fn update_vector(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateVectorRequest>,
) -> Result<Json<VectorResponse>, ApiError> {
    let vector = Vector::new(payload.embedding)?.with_id(id);
    let vector = match payload.metadata {
        Some(metadata) => vector.with_metadata(metadata),
        None => vector,
    };
    let vector = run(&state, move |store| store.update_vector(vector)).await?;
    info!("Updated vector {}", vector.id().unwrap_or_default());
    Ok(Json(VectorResponse { vector }))
}

async fn update_vectors(
    State(state): State<AppState>,
    Json(payload): Json<BatchRequest>,
) -> Result<Json<VectorsResponse>, ApiError> {
    let vectors = payload
        .vectors
        .into_iter()
        .map(VectorPayload::into_vector)
        .collect::<VectorStoreResult<Vec<_>>>()?;
    let vectors = run(&state, move |store| store.update_vectors(vectors)).await?;
    info!("Updated {} vectors", vectors.len());
    Ok(Json(VectorsResponse { vectors }))
}

async fn delete_vector(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let target = id.clone();
    run(&state, move |store| store.delete_vector(&target)).await?;
    info!("Deleted vector {}", id);
    Ok(Json(serde_json::json!({})))
}

async fn delete_vectors(
    State(state): State<AppState>,
    Json(payload): Json<DeleteVectorsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = payload.ids.len();
    run(&state, move |store| store.delete_vectors(&payload.ids)).await?;
    info!("Deleted {} vectors", count);
    Ok(Json(serde_json::json!({})))
}

async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let k = payload.k.unwrap_or(DEFAULT_K);
    let query = Vector::new(payload.embedding)?;
    let results = run(&state, move |store| store.get_neighbor_vectors(&query, k)).await?;
    info!("Search completed with {} results", results.len());
    Ok(Json(SearchResponse { results }))
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/vectors", post(insert_vector))
        .route("/vectors/:id", get(get_vector).put(update_vector).delete(delete_vector))
        .route("/batch/vectors", post(insert_vectors).put(update_vectors))
        .route("/batch/delete", post(delete_vectors))
        .route("/search", post(search))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(
    store: Box<dyn VectorStore>,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let store: AppState = Arc::from(store);
    let app = create_app(Arc::clone(&store));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    info!("vectorbridge gateway for {} starting on {}:{}", store.backend(), host, port);

    axum::serve(listener, app).await?;

    // Blocking clients must not be dropped on an async worker.
    tokio::task::spawn_blocking(move || drop(store)).await?;
    Ok(())
}
