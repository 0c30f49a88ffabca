//! # Milvus Adapter
//!
//! Uses the Milvus v2 RESTful API (`/v2/vectordb/...`). Milvus answers HTTP
//! 200 for most failures and reports them through a non-zero `code` in the
//! body, which is surfaced as a backend error.
//!
//! Collections are created with the quick-setup shape: a VarChar primary key
//! `id`, a float vector field `vector`, and dynamic fields enabled so the
//! metadata map can be stored as-is under `metadata`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::backends::{parse_embedding, parse_id, parse_metadata};
use crate::config::{non_empty, require, require_port, require_size};
use crate::distance::{DistanceFunction, MetricTable};
use crate::errors::{VectorStoreError, VectorStoreResult};
use crate::store::{ensure_ids, last_writes, VectorStore};
use crate::transport::{base_url, Connector, Endpoint, HttpConnector, HttpRequest, JsonClient};
use crate::vector::{Vector, VectorDistance};

const BACKEND: &str = "milvus";
const ID_MAX_LENGTH: usize = 512;

/// Metrics for float-vector collections. HAMMING and JACCARD need a binary
/// vector field and are not offered.
pub const MILVUS_METRICS: MetricTable = MetricTable::new(
    BACKEND,
    &[
        (DistanceFunction::Cosine, "COSINE"),
        (DistanceFunction::Euclidean, "L2"),
        (DistanceFunction::Dot, "IP"),
    ],
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilvusConfig {
    pub host: String,
    pub port: u16,
    pub https: bool,
    pub token: Option<String>,
    pub collection: String,
    pub vector_size: Option<usize>,
    pub distance_function: DistanceFunction,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 19530,
            https: false,
            token: None,
            collection: String::new(),
            vector_size: None,
            distance_function: DistanceFunction::Cosine,
        }
    }
}

pub struct MilvusStore {
    client: JsonClient,
    collection: String,
    distance_function: DistanceFunction,
}

impl MilvusStore {
    pub fn connect(config: MilvusConfig) -> VectorStoreResult<Self> {
        Self::connect_with(config, &HttpConnector::new())
    }

    pub fn connect_with(config: MilvusConfig, connector: &dyn Connector) -> VectorStoreResult<Self> {
        let host = require("host", &config.host)?;
        let port = require_port(config.port)?;
        let collection = require("collection", &config.collection)?.to_string();
        let vector_size = require_size("vector_size", config.vector_size)?;
        let metric = MILVUS_METRICS.resolve(config.distance_function)?;

        let mut endpoint = Endpoint::new(base_url(host, port, config.https));
        if let Some(token) = non_empty(&config.token) {
            endpoint = endpoint.bearer(token);
        }

        let client = JsonClient::connect(BACKEND, connector, &endpoint)?;
        let store = Self { client, collection, distance_function: config.distance_function };
        store
            .call("collections/list", json!({}))
            .map_err(|e| match e {
                VectorStoreError::Backend { backend, source } => VectorStoreError::Connection { backend, source },
                other => other,
            })?;
        store.ensure_collection(vector_size, metric)?;
        Ok(store)
    }

    /// POST to `/v2/vectordb/{action}` and unwrap the `data` member.
    fn call(&self, action: &str, body: Value) -> VectorStoreResult<Value> {
        let mut response = self.client.expect(HttpRequest::post(format!("/v2/vectordb/{}", action), body))?;
        let code = response["code"].as_i64().unwrap_or(0);
        if code != 0 {
            let message = response["message"].as_str().unwrap_or("unknown error");
            return Err(VectorStoreError::backend(
                BACKEND,
                format!("{} failed with code {}: {}", action, code, message),
            ));
        }
        Ok(response.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }

    fn ensure_collection(&self, vector_size: usize, metric: &str) -> VectorStoreResult<()> {
        let has = self.call("collections/has", json!({ "collectionName": self.collection }))?;
        if has["has"].as_bool() == Some(true) {
            return Ok(());
        }

        self.call(
            "collections/create",
            json!({
                "collectionName": self.collection,
                "dimension": vector_size,
                "metricType": metric,
                "idType": "VarChar",
                "primaryFieldName": "id",
                "vectorFieldName": "vector",
                "params": { "max_length": ID_MAX_LENGTH },
            }),
        )?;
        info!(collection = %self.collection, metric, vector_size, "created milvus collection");
        Ok(())
    }

    fn upsert(&self, vectors: &[Vector]) -> VectorStoreResult<()> {
        let data: Vec<Value> = vectors.iter().map(to_entity).collect();
        self.call("entities/upsert", json!({ "collectionName": self.collection, "data": data }))?;
        Ok(())
    }

    fn from_entity(&self, entity: &Value) -> VectorStoreResult<Vector> {
        let embedding = parse_embedding(&entity["vector"]).ok_or_else(|| self.client.malformed("entity vector"))?;
        Vector::from_parts(parse_id(&entity["id"]), embedding, parse_metadata(&entity["metadata"]))
    }
}

fn to_entity(vector: &Vector) -> Value {
    let mut entity = json!({ "id": vector.assigned_id(), "vector": vector.embedding() });
    if let Some(metadata) = vector.metadata() {
        entity["metadata"] = Value::Object(metadata.clone());
    }
    entity
}

/// Boolean filter selecting the given primary keys.
fn id_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("id in [{}]", quoted.join(", "))
}

impl VectorStore for MilvusStore {
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
        let data = self.call(
            "entities/get",
            json!({
                "collectionName": self.collection,
                "id": [id],
                "outputFields": ["vector", "metadata"],
            }),
        )?;
        match data.as_array().and_then(|rows| rows.first()) {
            Some(entity) => self.from_entity(entity).map(Some),
            None => Ok(None),
        }
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
        self.call("entities/delete", json!({ "collectionName": self.collection, "filter": id_filter(ids) }))?;
        Ok(())
    }

    fn get_neighbor_vectors(&self, query: &Vector, n: usize) -> VectorStoreResult<Vec<VectorDistance>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let data = self.call(
            "entities/search",
            json!({
                "collectionName": self.collection,
                "data": [query.embedding()],
                "annsField": "vector",
                "limit": n,
                "outputFields": ["vector", "metadata"],
            }),
        )?;

        let hits = match data.as_array() {
            Some(hits) => hits,
            None => return Ok(Vec::new()),
        };
        hits.iter()
            .map(|hit| {
                let distance = hit["distance"].as_f64().ok_or_else(|| self.client.malformed("hit distance"))?;
                Ok(VectorDistance::new(self.from_entity(hit)?, distance))
            })
            .collect()
    }
}
