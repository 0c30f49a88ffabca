//! # Store Configuration
//!
//! Each adapter takes its own `*Config` struct. [`StoreConfig`] wraps them in
//! one enum tagged by `"backend"` so a store can be described in a JSON file
//! and opened without the caller naming a concrete type:
//!
//! ```json
//! {
//!   "backend": "qdrant",
//!   "host": "localhost",
//!   "port": 6333,
//!   "collection": "documents",
//!   "vector_size": 3,
//!   "distance_function": "euclidean"
//! }
//! ```
//!
//! Missing fields fall back to the struct defaults and are then checked by
//! the adapter's `connect`, which names the first missing field in a
//! [`VectorStoreError::Configuration`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::backends::{
    ChromaConfig, ChromaStore, MilvusConfig, MilvusStore, PgvectorConfig, PgvectorStore, PineconeConfig,
    PineconeStore, QdrantConfig, QdrantStore, WeaviateConfig, WeaviateStore,
};
use crate::errors::{VectorStoreError, VectorStoreResult};
use crate::store::VectorStore;

/// Error types for configuration files
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for any supported backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Chroma(ChromaConfig),
    Qdrant(QdrantConfig),
    Milvus(MilvusConfig),
    Weaviate(WeaviateConfig),
    Pinecone(PineconeConfig),
    Pgvector(PgvectorConfig),
}

impl StoreConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json_data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json_data)?)
    }

    pub fn backend(&self) -> &'static str {
        match self {
            StoreConfig::Chroma(_) => "chroma",
            StoreConfig::Qdrant(_) => "qdrant",
            StoreConfig::Milvus(_) => "milvus",
            StoreConfig::Weaviate(_) => "weaviate",
            StoreConfig::Pinecone(_) => "pinecone",
            StoreConfig::Pgvector(_) => "pgvector",
        }
    }
}

/// Connect to the configured backend.
pub fn open_store(config: StoreConfig) -> VectorStoreResult<Box<dyn VectorStore>> {
    info!(backend = config.backend(), "opening vector store");
    Ok(match config {
        StoreConfig::Chroma(c) => Box::new(ChromaStore::connect(c)?),
        StoreConfig::Qdrant(c) => Box::new(QdrantStore::connect(c)?),
        StoreConfig::Milvus(c) => Box::new(MilvusStore::connect(c)?),
        StoreConfig::Weaviate(c) => Box::new(WeaviateStore::connect(c)?),
        StoreConfig::Pinecone(c) => Box::new(PineconeStore::connect(c)?),
        StoreConfig::Pgvector(c) => Box::new(PgvectorStore::connect(c)?),
    })
}

/// Load a configuration file and connect to the backend it describes.
pub fn open_store_from_file(path: &Path) -> VectorStoreResult<Box<dyn VectorStore>> {
    open_store(StoreConfig::from_file(path)?)
}

/// Non-empty string parameter.
pub(crate) fn require<'a>(field: &str, value: &'a str) -> VectorStoreResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(VectorStoreError::configuration(field));
    }
    Ok(value)
}

/// Optional string parameter that must be present for this backend.
pub(crate) fn require_some<'a>(field: &str, value: Option<&'a str>) -> VectorStoreResult<&'a str> {
    require(field, value.unwrap_or_default())
}

pub(crate) fn require_port(port: u16) -> VectorStoreResult<u16> {
    if port == 0 {
        return Err(VectorStoreError::configuration("port"));
    }
    Ok(port)
}

/// Fixed vector width for backends that declare it up front.
pub(crate) fn require_size(field: &str, size: Option<usize>) -> VectorStoreResult<usize> {
    match size {
        Some(size) if size > 0 => Ok(size),
        _ => Err(VectorStoreError::configuration(field)),
    }
}

/// Optional secret, with empty strings treated as unset.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
