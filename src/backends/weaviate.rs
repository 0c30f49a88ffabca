//! # Weaviate Adapter
//!
//! Objects are written through the batch endpoint and searched with a
//! GraphQL `nearVector` query. The class is created with `vectorizer: none`
//! and a flat index, so Weaviate only stores the vectors it is given.
//!
//! Weaviate object ids must be UUIDs; caller ids are mapped through
//! [`identity::point_id`](crate::identity::point_id) and kept in the
//! `vectorId` property. Metadata is a JSON string in the `metadata` property.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::backends::{parse_embedding, parse_id};
use crate::config::{non_empty, require, require_port};
use crate::distance::{DistanceFunction, MetricTable};
use crate::errors::{VectorStoreError, VectorStoreResult};
use crate::identity::point_id;
use crate::metadata;
use crate::store::{ensure_ids, last_writes, VectorStore};
use crate::transport::{
    base_url, Connector, Endpoint, HttpConnector, HttpRequest, HttpResponse, JsonClient, Method, StatusError,
};
use crate::vector::{Vector, VectorDistance};

const BACKEND: &str = "weaviate";

pub const WEAVIATE_METRICS: MetricTable = MetricTable::new(
    BACKEND,
    &[
        (DistanceFunction::Cosine, "cosine"),
        (DistanceFunction::Euclidean, "l2-squared"),
        (DistanceFunction::Dot, "dot"),
        (DistanceFunction::Manhattan, "manhattan"),
        (DistanceFunction::Hamming, "hamming"),
    ],
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaviateConfig {
    pub host: String,
    pub port: u16,
    /// `http` or `https`
    pub scheme: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub distance_function: DistanceFunction,
}

impl Default for WeaviateConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            scheme: "http".to_string(),
            api_key: None,
            collection: String::new(),
            distance_function: DistanceFunction::Cosine,
        }
    }
}

pub struct WeaviateStore {
    client: JsonClient,
    class: String,
    distance_function: DistanceFunction,
}

/// Weaviate class names start with an upper-case letter.
fn class_name(collection: &str) -> String {
    let mut chars = collection.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl WeaviateStore {
    pub fn connect(config: WeaviateConfig) -> VectorStoreResult<Self> {
        Self::connect_with(config, &HttpConnector::new())
    }

    pub fn connect_with(config: WeaviateConfig, connector: &dyn Connector) -> VectorStoreResult<Self> {
        let host = require("host", &config.host)?;
        let port = require_port(config.port)?;
        let class = class_name(require("collection", &config.collection)?);
        let secure = match require("scheme", &config.scheme)?.to_ascii_lowercase().as_str() {
            "http" => false,
            "https" => true,
            _ => return Err(VectorStoreError::configuration("scheme")),
        };
        let distance = WEAVIATE_METRICS.resolve(config.distance_function)?;

        let mut endpoint = Endpoint::new(base_url(host, port, secure));
        if let Some(api_key) = non_empty(&config.api_key) {
            endpoint = endpoint.bearer(api_key);
        }

        let client = JsonClient::connect(BACKEND, connector, &endpoint)?;
        client.probe(HttpRequest::get("/v1/.well-known/ready"))?;

        let store = Self { client, class, distance_function: config.distance_function };
        store.ensure_class(distance)?;
        Ok(store)
    }

    fn ensure_class(&self, distance: &str) -> VectorStoreResult<()> {
        let response = self.client.call(HttpRequest::get(format!("/v1/schema/{}", self.class)))?;
        if response.is_success() {
            return Ok(());
        }
        if response.status != 404 {
            return Err(self.status_error(Method::GET, format!("/v1/schema/{}", self.class), response));
        }

        self.client.expect(HttpRequest::post(
            "/v1/schema",
            json!({
                "class": self.class,
                "vectorizer": "none",
                "vectorIndexType": "flat",
                "vectorIndexConfig": { "distance": distance },
                "properties": [
                    { "name": "metadata", "dataType": ["text"] },
                    { "name": "vectorId", "dataType": ["text"] },
                ],
            }),
        ))?;
        info!(class = %self.class, distance, "created weaviate class");
        Ok(())
    }

    fn status_error(&self, method: Method, path: String, response: HttpResponse) -> VectorStoreError {
        VectorStoreError::backend(BACKEND, StatusError { method, path, status: response.status, body: response.body })
    }

    fn object_path(&self, id: &str) -> String {
        format!("/v1/objects/{}/{}", self.class, point_id(id))
    }

    fn batch_upsert(&self, vectors: &[Vector]) -> VectorStoreResult<()> {
        let objects = vectors
            .iter()
            .map(|vector| {
                let encoded = metadata::encode(vector.metadata()).map_err(|e| VectorStoreError::backend(BACKEND, e))?;
                Ok(json!({
                    "class": self.class,
                    "id": point_id(vector.assigned_id()).to_string(),
                    "vector": vector.embedding(),
                    "properties": { "metadata": encoded, "vectorId": vector.assigned_id() },
                }))
            })
            .collect::<VectorStoreResult<Vec<Value>>>()?;

        let body = self.client.expect(HttpRequest::post("/v1/batch/objects", json!({ "objects": objects })))?;

        // The batch endpoint answers 200 and reports failures per object.
        let errors: Vec<&str> = body
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|object| object["result"]["errors"]["error"].as_array())
            .flatten()
            .filter_map(|error| error["message"].as_str())
            .collect();
        if !errors.is_empty() {
            return Err(VectorStoreError::backend(BACKEND, format!("batch write failed: {}", errors.join("; "))));
        }
        Ok(())
    }

    fn from_object(&self, id: &Value, embedding: &Value, properties: &Value) -> VectorStoreResult<Vector> {
        let embedding = parse_embedding(embedding).ok_or_else(|| self.client.malformed("object vector"))?;
        let metadata =
            metadata::decode(properties["metadata"].as_str()).map_err(|e| VectorStoreError::backend(BACKEND, e))?;
        let id = parse_id(&properties["vectorId"]).or_else(|| parse_id(id));
        Vector::from_parts(id, embedding, metadata)
    }
}

impl VectorStore for WeaviateStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn distance_function(&self) -> DistanceFunction {
        self.distance_function
    }

    fn insert_vector(&self, vector: Vector) -> VectorStoreResult<Vector> {
        let vector = vector.ensure_id();
        self.batch_upsert(std::slice::from_ref(&vector))?;
        Ok(vector)
    }

    fn insert_vectors(&self, vectors: Vec<Vector>) -> VectorStoreResult<Vec<Vector>> {
        if vectors.is_empty() {
            return Ok(vectors);
        }
        let vectors = ensure_ids(vectors);
        self.batch_upsert(&last_writes(&vectors))?;
        Ok(vectors)
    }

    fn read_vector(&self, id: &str) -> VectorStoreResult<Option<Vector>> {
        let path = self.object_path(id);
        let response = self.client.call(HttpRequest::get(path.as_str()).query("include", "vector"))?;
        match response.status {
            404 => Ok(None),
            _ if response.is_success() => {
                let body = &response.body;
                self.from_object(&body["id"], &body["vector"], &body["properties"]).map(Some)
            }
            _ => Err(self.status_error(Method::GET, path, response)),
        }
    }

    fn update_vector(&self, vector: Vector) -> VectorStoreResult<Vector> {
        self.insert_vector(vector)
    }

    fn update_vectors(&self, vectors: Vec<Vector>) -> VectorStoreResult<Vec<Vector>> {
        self.insert_vectors(vectors)
    }

    fn delete_vector(&self, id: &str) -> VectorStoreResult<()> {
        let path = self.object_path(id);
        let response = self.client.call(HttpRequest::delete(path.as_str()))?;
        if response.is_success() || response.status == 404 {
            Ok(())
        } else {
            Err(self.status_error(Method::DELETE, path, response))
        }
    }

    fn get_neighbor_vectors(&self, query: &Vector, n: usize) -> VectorStoreResult<Vec<VectorDistance>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let vector = serde_json::to_string(query.embedding()).map_err(|e| VectorStoreError::backend(BACKEND, e))?;
        let graphql = format!(
            "{{ Get {{ {}(nearVector: {{vector: {}}}, limit: {}) {{ metadata vectorId _additional {{ id distance vector }} }} }} }}",
            self.class, vector, n
        );
        let body = self.client.expect(HttpRequest::post("/v1/graphql", json!({ "query": graphql })))?;

        if let Some(errors) = body["errors"].as_array().filter(|e| !e.is_empty()) {
            let messages: Vec<&str> = errors.iter().filter_map(|e| e["message"].as_str()).collect();
            return Err(VectorStoreError::backend(BACKEND, format!("graphql query failed: {}", messages.join("; "))));
        }

        let hits = match body["data"]["Get"][self.class.as_str()].as_array() {
            Some(hits) => hits,
            None => return Ok(Vec::new()),
        };
        hits.iter()
            .map(|hit| {
                let additional = &hit["_additional"];
                let vector = self.from_object(&additional["id"], &additional["vector"], hit)?;
                let distance = additional["distance"].as_f64().ok_or_else(|| self.client.malformed("distance"))?;
                Ok(VectorDistance::new(vector, distance))
            })
            .collect()
    }
}
