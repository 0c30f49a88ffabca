//! # Vector Model
//!
//! [`Vector`] is the unit of data every adapter reads and writes, and
//! [`VectorDistance`] pairs a matched vector with the score the backend
//! reported for it.
//!
//! Identifiers are optional until a vector is written. [`Vector::ensure_id`]
//! assigns a random UUID once and returns the updated value; adapters call it
//! at write time and hand the result back to the caller so the id can be
//! used for later reads, updates and deletes.
//!
//! # Examples
//!
//! ```rust
//! use vectorbridge::Vector;
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let vector = Vector::new(vec![2.0, 2.0, 1.0])?
//!     .with_metadata(json!({"text": "hello"}).as_object().cloned().unwrap_or_default());
//! assert!(vector.id().is_none());
//!
//! let stored = vector.ensure_id();
//! assert!(stored.id().is_some());
//! # Ok(())
//! # }
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::errors::{VectorStoreError, VectorStoreResult};

/// Open key/value metadata attached to a vector.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Embedding plus identifier and optional metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vector {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    embedding: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

impl Vector {
    /// Create a vector without an id. Fails when `embedding` is empty.
    pub fn new(embedding: Vec<f32>) -> VectorStoreResult<Self> {
        if embedding.is_empty() {
            return Err(VectorStoreError::Validation("embedding is required".to_string()));
        }
        Ok(Self { id: None, embedding, metadata: None })
    }

    /// Rebuild a vector from the parts a backend returned.
    pub fn from_parts(
        id: Option<String>,
        embedding: Vec<f32>,
        metadata: Option<Metadata>,
    ) -> VectorStoreResult<Self> {
        Ok(Self::new(embedding)?.with_optional_id(id).with_optional_metadata(metadata))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn with_optional_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    fn with_optional_metadata(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Return this vector with an id, generating a random one if absent.
    /// An id that is already set is never replaced.
    pub fn ensure_id(self) -> Self {
        if self.id.is_some() {
            return self;
        }
        self.with_id(Uuid::new_v4().to_string())
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }

    /// Id of a vector that has been through [`ensure_id`](Self::ensure_id).
    pub(crate) fn assigned_id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct RawVector {
    #[serde(default)]
    id: Option<String>,
    embedding: Vec<f32>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl<'de> Deserialize<'de> for Vector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawVector::deserialize(deserializer)?;
        Vector::from_parts(raw.id, raw.embedding, raw.metadata).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id.as_deref().unwrap_or("None");
        write!(f, "Vector[id: {}, embedding: ", id)?;
        if self.embedding.len() > 10 {
            let (head, tail) = (&self.embedding[..5], &self.embedding[self.embedding.len() - 5..]);
            write!(f, "{:?}...{:?}", head, tail)?;
        } else {
            write!(f, "{:?}", self.embedding)?;
        }
        write!(f, ", embedding_length: {}, metadata: ", self.embedding.len())?;
        match &self.metadata {
            Some(metadata) => write!(f, "{}]", serde_json::Value::Object(metadata.clone())),
            None => write!(f, "None]"),
        }
    }
}

/// A neighbour returned by similarity search.
///
/// `distance` is whatever the backend reported for the configured metric:
/// similarity scores (cosine, dot) usually rank best-first descending while
/// distances (L2) rank ascending. It is never rescaled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorDistance {
    pub vector: Vector,
    pub distance: f64,
}

impl VectorDistance {
    pub fn new(vector: Vector, distance: f64) -> Self {
        Self { vector, distance }
    }
}

impl fmt::Display for VectorDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, distance={}", self.vector, self.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_embedding_is_rejected() {
        let result = Vector::new(Vec::new());
        assert!(matches!(result, Err(VectorStoreError::Validation(_))));
    }

    #[test]
    fn test_ensure_id_generates_once() {
        let vector = Vector::new(vec![1.0, 2.0]).unwrap().ensure_id();
        let id = vector.id().unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok());

        let again = vector.ensure_id();
        assert_eq!(again.id(), Some(id.as_str()));
    }

    #[test]
    fn test_ensure_id_keeps_caller_id() {
        let vector = Vector::new(vec![1.0]).unwrap().with_id("doc-1").ensure_id();
        assert_eq!(vector.id(), Some("doc-1"));
    }

    #[test]
    fn test_deserialize_validates_embedding() {
        let ok: Vector = serde_json::from_value(json!({
            "id": "a",
            "embedding": [1.0, 2.0],
            "metadata": {"text": "hi"}
        }))
        .unwrap();
        assert_eq!(ok.id(), Some("a"));
        assert_eq!(ok.metadata().unwrap()["text"], "hi");

        let bad = serde_json::from_value::<Vector>(json!({"embedding": []}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_display_abbreviates_long_embeddings() {
        let vector = Vector::new((0..12).map(|v| v as f32).collect()).unwrap().with_id("x");
        let rendered = vector.to_string();
        assert!(rendered.contains("[0.0, 1.0, 2.0, 3.0, 4.0]...[7.0, 8.0, 9.0, 10.0, 11.0]"));
        assert!(rendered.contains("embedding_length: 12"));
    }
}
