//! # VectorStore Contract
//!
//! Every backend adapter implements [`VectorStore`]. The trait fixes the
//! externally observable behaviour; how each call maps onto the backend's
//! wire protocol is up to the adapter.
//!
//! ## Semantics shared by all adapters
//!
//! - Writes assign an id when the vector has none and return the stored value.
//! - `read_vector` returns `Ok(None)` for an unknown id. Any other failure is
//!   an error.
//! - `delete_vector` is idempotent.
//! - Batch calls with empty input return immediately without contacting the
//!   backend. They are not atomic: a failure part-way through is reported as
//!   one error and earlier items may already be applied.
//! - `get_neighbor_vectors` returns at most `n` results in the backend's own
//!   ranking for the configured metric, and an empty list for an empty store.
//!
//! The batch methods have default implementations that loop over the
//! single-item call. Adapters with a bulk primitive override them.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::distance::DistanceFunction;
use crate::errors::VectorStoreResult;
use crate::vector::{Vector, VectorDistance};

pub trait VectorStore: Send + Sync {
    /// Short backend name, e.g. `"qdrant"`.
    fn backend(&self) -> &'static str;

    /// Metric the store was connected with.
    fn distance_function(&self) -> DistanceFunction;

    /// Upsert one vector. Returns it with its id populated.
    fn insert_vector(&self, vector: Vector) -> VectorStoreResult<Vector>;

    fn insert_vectors(&self, vectors: Vec<Vector>) -> VectorStoreResult<Vec<Vector>> {
        vectors.into_iter().map(|v| self.insert_vector(v)).collect()
    }

    fn read_vector(&self, id: &str) -> VectorStoreResult<Option<Vector>>;

    /// Overwrite a vector. On upsert backends this is the same as
    /// [`insert_vector`](Self::insert_vector).
    fn update_vector(&self, vector: Vector) -> VectorStoreResult<Vector>;

    fn update_vectors(&self, vectors: Vec<Vector>) -> VectorStoreResult<Vec<Vector>> {
        vectors.into_iter().map(|v| self.update_vector(v)).collect()
    }

    fn delete_vector(&self, id: &str) -> VectorStoreResult<()>;

    fn delete_vectors(&self, ids: &[String]) -> VectorStoreResult<()> {
        ids.iter().try_for_each(|id| self.delete_vector(id))
    }

    /// Delete by vector values. Vectors that never got an id cannot be
    /// stored anywhere and are skipped.
    fn delete_vectors_of(&self, vectors: &[Vector]) -> VectorStoreResult<()> {
        let ids: Vec<String> = vectors
            .iter()
            .filter_map(|v| v.id().map(str::to_string))
            .collect();
        self.delete_vectors(&ids)
    }

    fn get_neighbor_vectors(&self, query: &Vector, n: usize) -> VectorStoreResult<Vec<VectorDistance>>;
}

/// Assign ids to a batch ahead of a bulk write.
pub(crate) fn ensure_ids(vectors: Vec<Vector>) -> Vec<Vector> {
    vectors.into_iter().map(Vector::ensure_id).collect()
}

/// One entry per id for a bulk write, keeping the last occurrence of each.
/// Looping the single-item call over the batch would leave the same state.
pub(crate) fn last_writes(vectors: &[Vector]) -> Cow<'_, [Vector]> {
    let mut last = HashMap::with_capacity(vectors.len());
    for (i, vector) in vectors.iter().enumerate() {
        last.insert(vector.assigned_id(), i);
    }
    if last.len() == vectors.len() {
        return Cow::Borrowed(vectors);
    }
    Cow::Owned(
        vectors
            .iter()
            .enumerate()
            .filter(|(i, vector)| last.get(vector.assigned_id()) == Some(i))
            .map(|(_, vector)| vector.clone())
            .collect(),
    )
}
