//! # Chroma Adapter
//!
//! Uses the Chroma v2 REST API. The collection is resolved once with
//! `get_or_create` and addressed by its server-side id afterwards.
//!
//! Chroma only accepts scalar metadata values, so the caller's metadata map
//! is JSON-encoded into a single `metadata` string entry.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::backends::{parse_embedding, parse_id};
use crate::config::{non_empty, require, require_port};
use crate::distance::{DistanceFunction, MetricTable};
use crate::errors::{VectorStoreError, VectorStoreResult};
use crate::metadata;
use crate::store::{ensure_ids, last_writes, VectorStore};
use crate::transport::{base_url, Connector, Endpoint, HttpConnector, HttpRequest, JsonClient};
use crate::vector::{Metadata, Vector, VectorDistance};

const BACKEND: &str = "chroma";

pub const CHROMA_METRICS: MetricTable = MetricTable::new(
    BACKEND,
    &[
        (DistanceFunction::Cosine, "cosine"),
        (DistanceFunction::Euclidean, "l2"),
        (DistanceFunction::Dot, "ip"),
    ],
);

/// How credentials are presented to a secured Chroma server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChromaAuth {
    /// `X-Chroma-Token` header
    Token,
    /// `Authorization: Bearer` header
    Bearer,
    /// HTTP basic auth from `user:password` credentials
    Basic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub auth_provider: Option<ChromaAuth>,
    pub auth_credentials: Option<String>,
    pub tenant: String,
    pub database: String,
    pub collection: String,
    pub distance_function: DistanceFunction,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            ssl: false,
            auth_provider: None,
            auth_credentials: None,
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
            collection: String::new(),
            distance_function: DistanceFunction::Euclidean,
        }
    }
}

pub struct ChromaStore {
    client: JsonClient,
    collection_path: String,
    distance_function: DistanceFunction,
}

impl ChromaStore {
    pub fn connect(config: ChromaConfig) -> VectorStoreResult<Self> {
        Self::connect_with(config, &HttpConnector::new())
    }

    pub fn connect_with(config: ChromaConfig, connector: &dyn Connector) -> VectorStoreResult<Self> {
        let host = require("host", &config.host)?;
        let port = require_port(config.port)?;
        let collection = require("collection", &config.collection)?;
        let tenant = require("tenant", &config.tenant)?;
        let database = require("database", &config.database)?;
        let space = CHROMA_METRICS.resolve(config.distance_function)?;

        let endpoint = authenticate(Endpoint::new(base_url(host, port, config.ssl)), &config)?;
        let client = JsonClient::connect(BACKEND, connector, &endpoint)?;
        client.probe(HttpRequest::get("/api/v2/heartbeat"))?;

        let collections = format!("/api/v2/tenants/{}/databases/{}/collections", tenant, database);
        let body = client.expect(HttpRequest::post(
            collections.as_str(),
            json!({
                "name": collection,
                "get_or_create": true,
                "metadata": { "hnsw:space": space },
            }),
        ))?;
        let id = body["id"].as_str().ok_or_else(|| client.malformed("collection id"))?;
        info!(collection, id, space, "resolved chroma collection");

        Ok(Self {
            collection_path: format!("{}/{}", collections, id),
            client,
            distance_function: config.distance_function,
        })
    }

    fn upsert(&self, vectors: &[Vector]) -> VectorStoreResult<()> {
        let mut ids = Vec::with_capacity(vectors.len());
        let mut embeddings = Vec::with_capacity(vectors.len());
        let mut metadatas = Vec::with_capacity(vectors.len());
        for vector in vectors {
            ids.push(vector.assigned_id());
            embeddings.push(vector.embedding());
            metadatas.push(encode_metadata(vector.metadata())?);
        }

        self.client.expect(HttpRequest::post(
            format!("{}/upsert", self.collection_path),
            json!({ "ids": ids, "embeddings": embeddings, "metadatas": metadatas }),
        ))?;
        Ok(())
    }

    fn decode(&self, id: &Value, embedding: &Value, metadata: &Value) -> VectorStoreResult<Vector> {
        let embedding = parse_embedding(embedding).ok_or_else(|| self.client.malformed("embedding"))?;
        let metadata = metadata::decode(metadata["metadata"].as_str())
            .map_err(|e| VectorStoreError::backend(BACKEND, e))?;
        Vector::from_parts(parse_id(id), embedding, metadata)
    }
}

fn authenticate(endpoint: Endpoint, config: &ChromaConfig) -> VectorStoreResult<Endpoint> {
    let Some(provider) = config.auth_provider else {
        return Ok(endpoint);
    };
    let credentials = non_empty(&config.auth_credentials)
        .ok_or_else(|| VectorStoreError::configuration("auth_credentials"))?;

    Ok(match provider {
        ChromaAuth::Token => endpoint.header("X-Chroma-Token", credentials),
        ChromaAuth::Bearer => endpoint.bearer(credentials),
        ChromaAuth::Basic => match credentials.split_once(':') {
            Some((user, password)) => endpoint.basic_auth(user, Some(password.to_string())),
            None => endpoint.basic_auth(credentials, None),
        },
    })
}

fn encode_metadata(metadata: Option<&Metadata>) -> VectorStoreResult<Value> {
    let encoded = metadata::encode(metadata).map_err(|e| VectorStoreError::backend(BACKEND, e))?;
    Ok(match encoded {
        Some(text) => json!({ "metadata": text }),
        None => Value::Null,
    })
}

impl VectorStore for ChromaStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn distance_function(&self) -> DistanceFunction {
        self.distance_function
    }

    fn insert_vector(&self, vector: Vector) -> VectorStoreResult<Vector> {
        let vector = vector.ensure_id();
        self.upsert(std::slice::from_ref(&vector))?;
        Ok(vector)
    }

    fn insert_vectors(&self, vectors: Vec<Vector>) -> VectorStoreResult<Vec<Vector>> {
        if vectors.is_empty() {
            return Ok(vectors);
        }
        let vectors = ensure_ids(vectors);
        self.upsert(&last_writes(&vectors))?;
        Ok(vectors)
    }

    fn read_vector(&self, id: &str) -> VectorStoreResult<Option<Vector>> {
        let body = self.client.expect(HttpRequest::post(
            format!("{}/get", self.collection_path),
            json!({ "ids": [id], "include": ["embeddings", "metadatas"] }),
        ))?;

        let ids = body["ids"].as_array().ok_or_else(|| self.client.malformed("ids"))?;
        if ids.is_empty() {
            return Ok(None);
        }
        self.decode(&ids[0], &body["embeddings"][0], &body["metadatas"][0]).map(Some)
    }

    fn update_vector(&self, vector: Vector) -> VectorStoreResult<Vector> {
        self.insert_vector(vector)
    }

    fn update_vectors(&self, vectors: Vec<Vector>) -> VectorStoreResult<Vec<Vector>> {
        self.insert_vectors(vectors)
    }

    fn delete_vector(&self, id: &str) -> VectorStoreResult<()> {
        self.delete_vectors(&[id.to_string()])
    }

    fn delete_vectors(&self, ids: &[String]) -> VectorStoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.client
            .expect(HttpRequest::post(format!("{}/delete", self.collection_path), json!({ "ids": ids })))?;
        Ok(())
    }

    fn get_neighbor_vectors(&self, query: &Vector, n: usize) -> VectorStoreResult<Vec<VectorDistance>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let body = self.client.expect(HttpRequest::post(
            format!("{}/query", self.collection_path),
            json!({
                "query_embeddings": [query.embedding()],
                "n_results": n,
                "include": ["embeddings", "metadatas", "distances"],
            }),
        ))?;

        // One result list per query embedding; only one was sent.
        let ids = match body["ids"][0].as_array() {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                let vector = self.decode(id, &body["embeddings"][0][i], &body["metadatas"][0][i])?;
                let distance =
                    body["distances"][0][i].as_f64().ok_or_else(|| self.client.malformed("distance"))?;
                Ok(VectorDistance::new(vector, distance))
            })
            .collect()
    }
}
