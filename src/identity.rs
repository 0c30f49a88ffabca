//! Point ids for backends that only accept UUID keys.
//!
//! Qdrant and Weaviate reject arbitrary string ids. A caller id that already
//! parses as a UUID is used as-is; anything else is mapped to a UUID v5 in a
//! fixed namespace, so the same caller id always lands on the same point. The
//! caller id is stored next to the point and restored on read.

use uuid::Uuid;

const POINT_NAMESPACE: Uuid = Uuid::from_u128(0x6f0e_2c1a_8d4b_4f3e_9a57_3c2b_1d0e_5f4a);

/// Backend point id for a caller id.
pub fn point_id(id: &str) -> Uuid {
    Uuid::parse_str(id).unwrap_or_else(|_| Uuid::new_v5(&POINT_NAMESPACE, id.as_bytes()))
}
