//! # Qdrant Adapter
//!
//! Talks to Qdrant's REST API. Points are upserted with `wait=true` so a read
//! issued right after a write sees it.
//!
//! Qdrant keys points by UUID or unsigned integer only, so caller ids go
//! through [`identity::point_id`](crate::identity::point_id) and the original
//! id is kept in the payload under `vector_id`. Metadata is stored as a
//! structured payload object under `metadata`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::backends::{parse_embedding, parse_id, parse_metadata};
use crate::config::{non_empty, require, require_port, require_size};
use crate::distance::{DistanceFunction, MetricTable};
use crate::errors::VectorStoreResult;
use crate::identity::point_id;
use crate::store::{ensure_ids, last_writes, VectorStore};
use crate::transport::{base_url, Connector, Endpoint, HttpConnector, HttpRequest, JsonClient};
use crate::vector::{Vector, VectorDistance};

const BACKEND: &str = "qdrant";

pub const QDRANT_METRICS: MetricTable = MetricTable::new(
    BACKEND,
    &[
        (DistanceFunction::Cosine, "Cosine"),
        (DistanceFunction::Euclidean, "Euclid"),
        (DistanceFunction::Dot, "Dot"),
        (DistanceFunction::Manhattan, "Manhattan"),
    ],
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub host: String,
    pub port: u16,
    pub https: bool,
    pub api_key: Option<String>,
    pub collection: String,
    pub vector_size: Option<usize>,
    pub distance_function: DistanceFunction,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6333,
            https: false,
            api_key: None,
            collection: String::new(),
            vector_size: None,
            distance_function: DistanceFunction::Euclidean,
        }
    }
}

pub struct QdrantStore {
    client: JsonClient,
    collection: String,
    distance_function: DistanceFunction,
}

impl QdrantStore {
    pub fn connect(config: QdrantConfig) -> VectorStoreResult<Self> {
        Self::connect_with(config, &HttpConnector::new())
    }

    pub fn connect_with(config: QdrantConfig, connector: &dyn Connector) -> VectorStoreResult<Self> {
        let host = require("host", &config.host)?;
        let port = require_port(config.port)?;
        let collection = require("collection", &config.collection)?.to_string();
        let vector_size = require_size("vector_size", config.vector_size)?;
        let metric = QDRANT_METRICS.resolve(config.distance_function)?;

        let mut endpoint = Endpoint::new(base_url(host, port, config.https));
        if let Some(api_key) = non_empty(&config.api_key) {
            endpoint = endpoint.header("api-key", api_key);
        }

        let client = JsonClient::connect(BACKEND, connector, &endpoint)?;
        client.probe(HttpRequest::get("/healthz"))?;

        let store = Self { client, collection, distance_function: config.distance_function };
        store.ensure_collection(vector_size, metric)?;
        Ok(store)
    }

    fn ensure_collection(&self, vector_size: usize, metric: &str) -> VectorStoreResult<()> {
        let exists = self
            .client
            .expect(HttpRequest::get(format!("/collections/{}/exists", self.collection)))?;
        if exists["result"]["exists"].as_bool() == Some(true) {
            return Ok(());
        }

        self.client.expect(HttpRequest::put(
            format!("/collections/{}", self.collection),
            json!({ "vectors": { "size": vector_size, "distance": metric } }),
        ))?;
        info!(collection = %self.collection, metric, vector_size, "created qdrant collection");
        Ok(())
    }

    fn upsert(&self, vectors: &[Vector]) -> VectorStoreResult<()> {
        let points: Vec<Value> = vectors.iter().map(to_point).collect();
        self.client.expect(
            HttpRequest::put(format!("/collections/{}/points", self.collection), json!({ "points": points }))
                .query("wait", "true"),
        )?;
        Ok(())
    }

    fn delete_points(&self, ids: &[String]) -> VectorStoreResult<()> {
        let points: Vec<String> = ids.iter().map(|id| point_id(id).to_string()).collect();
        self.client.expect(
            HttpRequest::post(
                format!("/collections/{}/points/delete", self.collection),
                json!({ "points": points }),
            )
            .query("wait", "true"),
        )?;
        Ok(())
    }

    fn from_point(&self, point: &Value) -> VectorStoreResult<Vector> {
        let payload = &point["payload"];
        let id = parse_id(&payload["vector_id"]).or_else(|| parse_id(&point["id"]));
        let embedding = parse_embedding(&point["vector"]).ok_or_else(|| self.client.malformed("point vector"))?;
        Vector::from_parts(id, embedding, parse_metadata(&payload["metadata"]))
    }
}

fn to_point(vector: &Vector) -> Value {
    let id = vector.assigned_id();
    json!({
        "id": point_id(id).to_string(),
        "vector": vector.embedding(),
        "payload": { "vector_id": id, "metadata": vector.metadata() },
    })
}

impl VectorStore for QdrantStore {
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
            format!("/collections/{}/points", self.collection),
            json!({ "ids": [point_id(id).to_string()], "with_payload": true, "with_vector": true }),
        ))?;
        let points = body["result"].as_array().ok_or_else(|| self.client.malformed("missing result"))?;
        points.first().map(|point| self.from_point(point)).transpose()
    }

    fn update_vector(&self, vector: Vector) -> VectorStoreResult<Vector> {
        self.insert_vector(vector)
    }

    fn update_vectors(&self, vectors: Vec<Vector>) -> VectorStoreResult<Vec<Vector>> {
        self.insert_vectors(vectors)
    }

    fn delete_vector(&self, id: &str) -> VectorStoreResult<()> {
        self.delete_points(&[id.to_string()])
    }

    fn delete_vectors(&self, ids: &[String]) -> VectorStoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.delete_points(ids)
    }

    fn get_neighbor_vectors(&self, query: &Vector, n: usize) -> VectorStoreResult<Vec<VectorDistance>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let body = self.client.expect(HttpRequest::post(
            format!("/collections/{}/points/search", self.collection),
            json!({
                "vector": query.embedding(),
                "limit": n,
                "with_payload": true,
                "with_vector": true,
            }),
        ))?;

        let points = body["result"].as_array().ok_or_else(|| self.client.malformed("missing result"))?;
        points
            .iter()
            .map(|point| {
                let score = point["score"].as_f64().ok_or_else(|| self.client.malformed("point score"))?;
                Ok(VectorDistance::new(self.from_point(point)?, score))
            })
            .collect()
    }
}
