//! # Backend Adapters
//!
//! One [`VectorStore`](crate::VectorStore) implementation per backend:
//!
//! | Adapter | Protocol | Writes | Metadata storage | Point ids |
//! |---------|----------|--------|------------------|-----------|
//! | [`ChromaStore`] | REST v2 | upsert | JSON string | caller id |
//! | [`QdrantStore`] | REST | upsert | structured payload | UUID (v5 for other ids) |
//! | [`MilvusStore`] | REST v2 | upsert | dynamic JSON field | caller id |
//! | [`WeaviateStore`] | REST + GraphQL | batch upsert | JSON string | UUID (v5 for other ids) |
//! | [`PineconeStore`] | REST | upsert | structured map | caller id |
//! | [`PgvectorStore`] | SQL | upsert insert, explicit update | JSON string | caller id |
//!
//! Each adapter validates its configuration, resolves the metric, probes the
//! backend and provisions the collection inside `connect`, in that order.

pub mod chroma;
pub mod milvus;
pub mod pgvector;
pub mod pinecone;
pub mod qdrant;
pub mod weaviate;

pub use chroma::{ChromaAuth, ChromaConfig, ChromaStore};
pub use milvus::{MilvusConfig, MilvusStore};
pub use pgvector::{PgvectorConfig, PgvectorStore, PostgresSession, SqlCell, SqlRow, SqlSession, SqlValue};
pub use pinecone::{PineconeConfig, PineconeStore};
pub use qdrant::{QdrantConfig, QdrantStore};
pub use weaviate::{WeaviateConfig, WeaviateStore};

use serde_json::Value;

use crate::vector::Metadata;

/// Embedding from a JSON array of numbers.
pub(crate) fn parse_embedding(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Id that a backend may report as a string or a number.
pub(crate) fn parse_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Structured metadata; anything that is not an object counts as absent.
pub(crate) fn parse_metadata(value: &Value) -> Option<Metadata> {
    value.as_object().cloned()
}
