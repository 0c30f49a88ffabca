//! # vectorbridge
//!
//! One create/read/update/delete and nearest-neighbour contract over six
//! vector databases: Chroma, Qdrant, Milvus, Weaviate, Pinecone and pgvector.
//!
//! Code written against [`VectorStore`] keeps working when the backend is
//! swapped; only the `*Config` passed at construction changes.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vectorbridge::{QdrantConfig, QdrantStore, Vector, VectorStore, DistanceFunction};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = QdrantStore::connect(QdrantConfig {
//!     collection: "documents".to_string(),
//!     vector_size: Some(3),
//!     distance_function: DistanceFunction::Euclidean,
//!     ..QdrantConfig::default()
//! })?;
//!
//! let stored = store.insert_vector(Vector::new(vec![2.0, 2.0, 1.0])?)?;
//! let neighbours = store.get_neighbor_vectors(&stored, 3)?;
//! for neighbour in neighbours {
//!     println!("{}", neighbour);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! | Backend | Metrics |
//! |---------|---------|
//! | Chroma | cosine, euclidean, dot |
//! | Qdrant | cosine, euclidean, dot, manhattan |
//! | Milvus | cosine, euclidean, dot |
//! | Weaviate | cosine, euclidean, dot, manhattan, hamming |
//! | Pinecone | cosine, euclidean, dot |
//! | pgvector | cosine, euclidean, dot, manhattan |
//!
//! Asking for a metric a backend lacks fails at connect time with
//! [`VectorStoreError::UnsupportedMetric`], before anything is sent.
//!
//! # HTTP Gateway
//!
//! [`start_server`] serves a configured store over HTTP; see the
//! [`server`] module for the routes.

pub mod backends;
pub mod config;
pub mod distance;
pub mod errors;
pub mod identity;
pub mod metadata;
pub mod server;
pub mod store;
pub mod transport;
pub mod vector;

pub use backends::{
    ChromaAuth, ChromaConfig, ChromaStore, MilvusConfig, MilvusStore, PgvectorConfig, PgvectorStore,
    PineconeConfig, PineconeStore, PostgresSession, QdrantConfig, QdrantStore, SqlCell, SqlRow, SqlSession,
    SqlValue, WeaviateConfig, WeaviateStore,
};
pub use config::{open_store, open_store_from_file, ConfigError, StoreConfig};
pub use distance::{DistanceFunction, MetricTable};
pub use errors::{VectorStoreError, VectorStoreResult};
pub use server::{create_app, start_server};
pub use store::VectorStore;
pub use transport::{Connector, Endpoint, HttpConnector, HttpRequest, HttpResponse, Transport};
pub use vector::{Metadata, Vector, VectorDistance};
