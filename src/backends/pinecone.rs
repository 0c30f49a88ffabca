//! # Pinecone Adapter
//!
//! Pinecone splits its API in two. The control plane
//! (`https://api.pinecone.io`) describes and creates indexes; each index then
//! has its own data-plane host for reads and writes. When the config names
//! a `host` the control plane is skipped entirely.
//!
//! New indexes are created serverless, and `connect` waits until Pinecone
//! reports them ready.
//!
//! Metadata is sent as a structured map so it stays filterable. Pinecone only
//! holds strings, numbers, booleans and lists of strings, and hands integers
//! back as floats. When a map has anything else, the whole map is also stored
//! JSON-encoded under [`ENCODED_METADATA_KEY`] and that copy is what reads
//! return.

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::backends::{parse_embedding, parse_id, parse_metadata};
use crate::config::{non_empty, require, require_some};
use crate::distance::{DistanceFunction, MetricTable};
use crate::errors::{VectorStoreError, VectorStoreResult};
use crate::metadata;
use crate::store::{ensure_ids, last_writes, VectorStore};
use crate::transport::{Connector, Endpoint, HttpConnector, HttpRequest, JsonClient};
use crate::vector::{Metadata, Vector, VectorDistance};

const BACKEND: &str = "pinecone";
const API_VERSION: &str = "2024-07";
const UPSERT_BATCH_SIZE: usize = 100;
const CLOUDS: [&str; 3] = ["aws", "gcp", "azure"];
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Reserved metadata key holding the JSON-encoded map.
pub const ENCODED_METADATA_KEY: &str = "_vectorbridge_metadata";

pub const PINECONE_METRICS: MetricTable = MetricTable::new(
    BACKEND,
    &[
        (DistanceFunction::Cosine, "cosine"),
        (DistanceFunction::Euclidean, "euclidean"),
        (DistanceFunction::Dot, "dotproduct"),
    ],
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeConfig {
    pub api_key: Option<String>,
    /// Data-plane host of an existing index
    pub host: Option<String>,
    pub index_name: Option<String>,
    /// Needed only when the index has to be created
    pub dimension: Option<usize>,
    pub cloud: String,
    pub region: String,
    pub distance_function: DistanceFunction,
    pub control_plane_url: String,
    /// How long `connect` waits for an index to become ready
    pub ready_timeout_secs: u64,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            host: None,
            index_name: None,
            dimension: None,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            distance_function: DistanceFunction::Cosine,
            control_plane_url: "https://api.pinecone.io".to_string(),
            ready_timeout_secs: 300,
        }
    }
}

pub struct PineconeStore {
    client: JsonClient,
    distance_function: DistanceFunction,
}

fn authenticated(url: &str, api_key: &str) -> Endpoint {
    Endpoint::new(url)
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
}

fn host_url(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn serverless_cloud(cloud: &str) -> &str {
    let cloud = cloud.trim();
    match CLOUDS.iter().find(|c| c.eq_ignore_ascii_case(cloud)) {
        Some(known) => *known,
        None => {
            warn!(cloud, "unknown pinecone cloud, falling back to aws");
            "aws"
        }
    }
}

impl PineconeStore {
    pub fn connect(config: PineconeConfig) -> VectorStoreResult<Self> {
        Self::connect_with(config, &HttpConnector::new())
    }

    pub fn connect_with(config: PineconeConfig, connector: &dyn Connector) -> VectorStoreResult<Self> {
        let api_key = require_some("api_key", config.api_key.as_deref())?;
        let metric = PINECONE_METRICS.resolve(config.distance_function)?;

        let host = match non_empty(&config.host) {
            Some(host) => host.to_string(),
            None => {
                let index_name = require_some("index_name", config.index_name.as_deref())?;
                let control_plane = require("control_plane_url", &config.control_plane_url)?;
                let control = JsonClient::connect(BACKEND, connector, &authenticated(control_plane, api_key))?;
                resolve_index(&control, index_name, metric, &config)?
            }
        };

        let client = JsonClient::connect(BACKEND, connector, &authenticated(&host_url(&host), api_key))?;
        client.probe(HttpRequest::post("/describe_index_stats", json!({})))?;
        Ok(Self { client, distance_function: config.distance_function })
    }

    fn upsert(&self, vectors: &[Vector]) -> VectorStoreResult<()> {
        for chunk in vectors.chunks(UPSERT_BATCH_SIZE) {
            let records = chunk.iter().map(to_record).collect::<VectorStoreResult<Vec<Value>>>()?;
            self.client.expect(HttpRequest::post("/vectors/upsert", json!({ "vectors": records })))?;
        }
        Ok(())
    }

    fn from_record(&self, record: &Value) -> VectorStoreResult<Vector> {
        let embedding = parse_embedding(&record["values"]).ok_or_else(|| self.client.malformed("record values"))?;
        Vector::from_parts(parse_id(&record["id"]), embedding, from_metadata(&record["metadata"])?)
    }
}

/// Data-plane host for `index_name`, creating the index when it is missing.
fn resolve_index(
    control: &JsonClient,
    index_name: &str,
    metric: &str,
    config: &PineconeConfig,
) -> VectorStoreResult<String> {
    let path = format!("/indexes/{}", index_name);
    let response = control.call(HttpRequest::get(path.as_str())).map_err(|e| match e {
        VectorStoreError::Backend { backend, source } => VectorStoreError::Connection { backend, source },
        other => other,
    })?;

    let description = match response.status {
        404 => {
            let dimension = match config.dimension {
                Some(dimension) if dimension > 0 => dimension,
                _ => return Err(VectorStoreError::configuration("dimension")),
            };
            let cloud = serverless_cloud(&config.cloud);
            let region = require("region", &config.region)?;
            let created = control.expect(HttpRequest::post(
                "/indexes",
                json!({
                    "name": index_name,
                    "dimension": dimension,
                    "metric": metric,
                    "spec": { "serverless": { "cloud": cloud, "region": region } },
                }),
            ))?;
            info!(index = index_name, metric, dimension, cloud, region, "created pinecone index");
            created
        }
        _ if response.is_success() => {
            if let Some(existing) = response.body["metric"].as_str().filter(|m| *m != metric) {
                warn!(index = index_name, existing, requested = metric, "pinecone index uses a different metric");
            }
            response.body
        }
        status => {
            return Err(VectorStoreError::connection(
                BACKEND,
                format!("describe index {} returned HTTP {}: {}", index_name, status, response.body),
            ))
        }
    };

    let description = if is_ready(&description) {
        description
    } else {
        let timeout = Duration::from_secs(config.ready_timeout_secs);
        wait_until_ready(control, &path, index_name, timeout)?
    };

    description["host"]
        .as_str()
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .ok_or_else(|| control.malformed("index host"))
}

/// Missing status counts as ready; only an explicit `false` waits.
fn is_ready(description: &Value) -> bool {
    description["status"]["ready"].as_bool() != Some(false)
}

fn wait_until_ready(
    control: &JsonClient,
    path: &str,
    index_name: &str,
    timeout: Duration,
) -> VectorStoreResult<Value> {
    let started = Instant::now();
    loop {
        let description = control.expect(HttpRequest::get(path))?;
        if is_ready(&description) {
            info!(index = index_name, "pinecone index ready");
            return Ok(description);
        }
        if started.elapsed() >= timeout {
            return Err(VectorStoreError::connection(
                BACKEND,
                format!("index {} not ready after {}s", index_name, timeout.as_secs()),
            ));
        }
        debug!(index = index_name, state = %description["status"]["state"], "waiting for pinecone index");
        thread::sleep(READY_POLL_INTERVAL);
    }
}

/// Value Pinecone accepts as metadata.
fn storable(value: &Value) -> bool {
    match value {
        Value::String(_) | Value::Bool(_) | Value::Number(_) => true,
        Value::Array(items) => items.iter().all(Value::is_string),
        Value::Null | Value::Object(_) => false,
    }
}

/// Value Pinecone hands back unchanged.
fn exact(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_f64(),
        other => storable(other),
    }
}

fn to_metadata(metadata: &Metadata) -> VectorStoreResult<Metadata> {
    let mut stored: Metadata = metadata
        .iter()
        .filter(|(key, value)| key.as_str() != ENCODED_METADATA_KEY && storable(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let lossless = !metadata.is_empty() && stored.len() == metadata.len() && metadata.values().all(exact);
    if !lossless {
        let encoded = metadata::encode(Some(metadata)).map_err(|e| VectorStoreError::backend(BACKEND, e))?;
        stored.insert(ENCODED_METADATA_KEY.to_string(), json!(encoded));
    }
    Ok(stored)
}

fn from_metadata(value: &Value) -> VectorStoreResult<Option<Metadata>> {
    match value.get(ENCODED_METADATA_KEY) {
        Some(encoded) => metadata::decode(encoded.as_str()).map_err(|e| VectorStoreError::backend(BACKEND, e)),
        None => Ok(parse_metadata(value)),
    }
}

fn to_record(vector: &Vector) -> VectorStoreResult<Value> {
    let mut record = json!({ "id": vector.assigned_id(), "values": vector.embedding() });
    if let Some(metadata) = vector.metadata() {
        record["metadata"] = Value::Object(to_metadata(metadata)?);
    }
    Ok(record)
}

impl VectorStore for PineconeStore {
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
        let body = self.client.expect(HttpRequest::get("/vectors/fetch").query("ids", id))?;
        match body["vectors"].get(id) {
            Some(record) => self.from_record(record).map(Some),
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
        self.client.expect(HttpRequest::post("/vectors/delete", json!({ "ids": ids })))?;
        Ok(())
    }

    fn get_neighbor_vectors(&self, query: &Vector, n: usize) -> VectorStoreResult<Vec<VectorDistance>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let body = self.client.expect(HttpRequest::post(
            "/query",
            json!({
                "vector": query.embedding(),
                "topK": n,
                "includeValues": true,
                "includeMetadata": true,
            }),
        ))?;

        let matches = match body["matches"].as_array() {
            Some(matches) => matches,
            None => return Ok(Vec::new()),
        };
        matches
            .iter()
            .map(|m| {
                let score = m["score"].as_f64().ok_or_else(|| self.client.malformed("match score"))?;
                Ok(VectorDistance::new(self.from_record(m)?, score))
            })
            .collect()
    }
}
