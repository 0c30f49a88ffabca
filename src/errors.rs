//! # Error Types Module
//!
//! This module defines the error taxonomy shared by every backend adapter.
//! Adapters never surface backend-specific error types: anything that goes
//! wrong on the wire is wrapped into [`VectorStoreError::Backend`] (or
//! [`VectorStoreError::Connection`] while connecting), so callers can match
//! on one enum regardless of the store they talk to.

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;
use crate::distance::DistanceFunction;

/// Boxed error used to carry transport and driver failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for vector store operations
#[derive(Error, Debug)]
pub enum VectorStoreError {
    /// A required construction parameter is missing, empty or invalid
    #[error("{field} is required")]
    Configuration { field: String },

    /// The reachability probe or handshake failed while connecting
    #[error("failed to connect to {backend}: {source}")]
    Connection {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    /// The requested distance function has no native counterpart
    #[error("distance function {metric} unavailable on {backend}, supported: {}", format_metrics(.supported))]
    UnsupportedMetric {
        backend: &'static str,
        metric: DistanceFunction,
        supported: Vec<DistanceFunction>,
    },

    /// Malformed vector
    #[error("invalid vector: {0}")]
    Validation(String),

    /// Explicit update targeted a record the backend does not have
    #[error("vector '{id}' not found")]
    NotFound { id: String },

    /// Transport or protocol failure reported by the backend
    #[error("{backend} request failed: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    /// Configuration file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn format_metrics(metrics: &[DistanceFunction]) -> String {
    metrics
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl VectorStoreError {
    pub(crate) fn configuration(field: &str) -> Self {
        VectorStoreError::Configuration { field: field.to_string() }
    }

    pub(crate) fn backend(backend: &'static str, source: impl Into<BoxError>) -> Self {
        VectorStoreError::Backend { backend, source: source.into() }
    }

    pub(crate) fn connection(backend: &'static str, source: impl Into<BoxError>) -> Self {
        VectorStoreError::Connection { backend, source: source.into() }
    }

    /// Convert the error to an appropriate HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            VectorStoreError::Configuration { .. } => StatusCode::BAD_REQUEST,
            VectorStoreError::UnsupportedMetric { .. } => StatusCode::BAD_REQUEST,
            VectorStoreError::Validation(_) => StatusCode::BAD_REQUEST,
            VectorStoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            VectorStoreError::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
            VectorStoreError::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            VectorStoreError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx status codes)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx status codes)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// Result type for vector store operations
pub type VectorStoreResult<T> = Result<T, VectorStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            VectorStoreError::NotFound { id: "a".to_string() }.status_code(),
            StatusCode::NOT_FOUND
        );

        assert_eq!(
            VectorStoreError::Validation("embedding is required".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );

        assert_eq!(
            VectorStoreError::connection("qdrant", "refused").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(VectorStoreError::configuration("collection").is_client_error());
        assert!(VectorStoreError::backend("milvus", "boom").is_server_error());
        assert!(!VectorStoreError::backend("milvus", "boom").is_client_error());
    }

    #[test]
    fn test_configuration_message_names_field() {
        let err = VectorStoreError::configuration("collection");
        assert_eq!(err.to_string(), "collection is required");
    }

    #[test]
    fn test_unsupported_metric_lists_alternatives() {
        let err = VectorStoreError::UnsupportedMetric {
            backend: "pinecone",
            metric: DistanceFunction::Manhattan,
            supported: vec![DistanceFunction::Cosine, DistanceFunction::Euclidean],
        };
        let message = err.to_string();
        assert!(message.contains("manhattan"));
        assert!(message.contains("pinecone"));
        assert!(message.contains("cosine, euclidean"));
    }
}
