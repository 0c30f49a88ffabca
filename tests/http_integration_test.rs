use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use vectorbridge::{
    create_app, DistanceFunction, Vector, VectorDistance, VectorStore, VectorStoreError, VectorStoreResult,
};

// In-memory store with explicit-update semantics, like pgvector
#[derive(Default)]
struct MemoryStore {
    vectors: Mutex<BTreeMap<String, Vector>>,
}

impl VectorStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn distance_function(&self) -> DistanceFunction {
        DistanceFunction::Euclidean
    }

    fn insert_vector(&self, vector: Vector) -> VectorStoreResult<Vector> {
        let vector = vector.ensure_id();
        let id = vector.id().unwrap().to_string();
        self.vectors.lock().unwrap().insert(id, vector.clone());
        Ok(vector)
    }

    fn read_vector(&self, id: &str) -> VectorStoreResult<Option<Vector>> {
        Ok(self.vectors.lock().unwrap().get(id).cloned())
    }

    fn update_vector(&self, vector: Vector) -> VectorStoreResult<Vector> {
        let id = vector.id().unwrap().to_string();
        let mut vectors = self.vectors.lock().unwrap();
        if !vectors.contains_key(&id) {
            return Err(VectorStoreError::NotFound { id });
        }
        vectors.insert(id, vector.clone());
        Ok(vector)
    }

    fn delete_vector(&self, id: &str) -> VectorStoreResult<()> {
        self.vectors.lock().unwrap().remove(id);
        Ok(())
    }

    fn get_neighbor_vectors(&self, query: &Vector, n: usize) -> VectorStoreResult<Vec<VectorDistance>> {
        let mut results: Vec<VectorDistance> = self
            .vectors
            .lock()
            .unwrap()
            .values()
            .map(|v| {
                let distance = v
                    .embedding()
                    .iter()
                    .zip(query.embedding())
                    .map(|(a, b)| ((a - b) as f64).powi(2))
                    .sum::<f64>()
                    .sqrt();
                VectorDistance::new(v.clone(), distance)
            })
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(n);
        Ok(results)
    }
}

fn create_test_app() -> Router {
    create_app(Arc::new(MemoryStore::default()))
}

fn json_request(method: &str, uri: &str, payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() { serde_json::Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();

    let request = Request::builder()
        .uri("/health")
        .method("GET")
        .body(Body::empty())
        .unwrap();

    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "vectorbridge");
    assert_eq!(json["backend"], "memory");
    assert_eq!(json["distance_function"], "euclidean");
}

#[tokio::test]
async fn test_insert_assigns_id_and_reads_back() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        json_request("POST", "/vectors", json!({"embedding": [2.0, 2.0, 1.0], "metadata": {"text": "hello"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = json["vector"]["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let request = Request::builder()
        .uri(format!("/vectors/{}", id))
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["vector"]["embedding"], json!([2.0, 2.0, 1.0]));
    assert_eq!(json["vector"]["metadata"]["text"], "hello");
}

#[tokio::test]
async fn test_read_missing_vector() {
    let app = create_test_app();

    let request = Request::builder()
        .uri("/vectors/nonexistent-id")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["message"].as_str().unwrap().contains("nonexistent-id"));
}

#[tokio::test]
async fn test_empty_embedding_is_bad_request() {
    let app = create_test_app();

    let (status, json) = send(&app, json_request("POST", "/vectors", json!({"embedding": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("embedding"));

    let (status, _) = send(&app, json_request("POST", "/search", json!({"embedding": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_last_write_wins() {
    let app = create_test_app();

    send(&app, json_request("POST", "/vectors", json!({"id": "v1", "embedding": [1.0, 1.0]}))).await;
    let (status, _) = send(
        &app,
        json_request("PUT", "/vectors/v1", json!({"embedding": [5.0, 5.0], "metadata": {"rev": 2}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder().uri("/vectors/v1").method("GET").body(Body::empty()).unwrap();
    let (_, json) = send(&app, request).await;
    assert_eq!(json["vector"]["embedding"], json!([5.0, 5.0]));
    assert_eq!(json["vector"]["metadata"]["rev"], 2);
}

#[tokio::test]
async fn test_update_missing_vector_is_not_found() {
    let app = create_test_app();

    let (status, _) = send(&app, json_request("PUT", "/vectors/never-inserted", json!({"embedding": [1.0]}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_insert_update_and_delete() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/batch/vectors",
            json!({"vectors": [{"id": "a", "embedding": [1.0]}, {"embedding": [2.0]}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let vectors = json["vectors"].as_array().unwrap();
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0]["id"], "a");
    let generated = vectors[1]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_request("PUT", "/batch/vectors", json!({"vectors": [{"id": "a", "embedding": [3.0]}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, json_request("POST", "/batch/delete", json!({"ids": ["a", generated]}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, json_request("POST", "/search", json!({"embedding": [1.0]}))).await;
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let app = create_test_app();

    for _ in 0..2 {
        let request = Request::builder()
            .uri("/vectors/never-inserted")
            .method("DELETE")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({}));
    }
}

#[tokio::test]
async fn test_search_orders_neighbours() {
    let app = create_test_app();

    for (id, embedding, text) in [
        ("v1", [2.0, 2.0, 1.0], "hello"),
        ("v2", [2.0, 2.0, 2.0], "hi"),
        ("v3", [2.0, 2.0, 3.0], "good morning!"),
    ] {
        let payload = json!({"id": id, "embedding": embedding, "metadata": {"text": text}});
        let (status, _) = send(&app, json_request("POST", "/vectors", payload)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = send(&app, json_request("POST", "/search", json!({"embedding": [2.0, 2.0, 1.0], "k": 3}))).await;
    assert_eq!(status, StatusCode::OK);
    let results = json["results"].as_array().unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r["vector"]["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["v1", "v2", "v3"]);
    assert_eq!(results[0]["distance"], 0.0);

    let (_, json) = send(&app, json_request("POST", "/search", json!({"embedding": [2.0, 2.0, 1.0], "k": 1}))).await;
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_route_words_are_valid_ids() {
    let app = create_test_app();

    for id in ["batch", "delete"] {
        let (status, _) = send(&app, json_request("POST", "/vectors", json!({"id": id, "embedding": [1.0]}))).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::builder()
            .uri(format!("/vectors/{}", id))
            .method("GET")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["vector"]["id"], id);

        let (status, _) = send(&app, json_request("PUT", &format!("/vectors/{}", id), json!({"embedding": [2.0]}))).await;
        assert_eq!(status, StatusCode::OK);
    }
}
