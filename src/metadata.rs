//! String codec for backends that keep metadata in a single text field.
//!
//! Chroma only accepts scalar metadata values, Weaviate stores it in a text
//! property and pgvector in a `text` column. Those adapters run metadata
//! through [`encode`] on the way in and [`decode`] on the way out so callers
//! always see the structured map.

use crate::errors::BoxError;
use crate::vector::Metadata;

/// JSON-encode metadata. `None` stays `None` so it can be stored as null.
pub fn encode(metadata: Option<&Metadata>) -> Result<Option<String>, BoxError> {
    metadata
        .map(|m| serde_json::to_string(m).map_err(BoxError::from))
        .transpose()
}

/// Decode a stored metadata string. A missing value or a JSON `null` decodes
/// to `None`; anything other than a JSON object is malformed.
pub fn decode(raw: Option<&str>) -> Result<Option<Metadata>, BoxError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        other => Err(format!("metadata must be a JSON object, got {}", other).into()),
    }
}
