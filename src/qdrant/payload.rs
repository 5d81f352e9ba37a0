//! Payload construction and owner-scoped point identifiers.

use crate::processing::DocumentChunk;
use crate::qdrant::filters::{DOCUMENT_KEY, OWNER_KEY};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Derive the deterministic point id for a chunk.
///
/// The id is a UUIDv5 over the owner-scoped key `"{owner}/{document}/{page}/{ordinal}"`,
/// so two owners can never collide on an id even for identical documents. Tenant
/// isolation therefore holds at the key scheme, not only at the query filter.
pub fn chunk_point_id(owner_id: &str, document_name: &str, page: u32, ordinal: usize) -> String {
    let key = format!("{owner_id}/{document_name}/{page}/{ordinal}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Build the stored payload for a chunk: text plus filterable metadata.
pub fn build_payload(chunk: &DocumentChunk, uploaded_at: &str) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("text".into(), Value::String(chunk.content.clone()));
    payload.insert(
        "page_number".into(),
        Value::Number(chunk.page_number.into()),
    );
    payload.insert(
        DOCUMENT_KEY.into(),
        Value::String(chunk.document_name.clone()),
    );
    payload.insert(OWNER_KEY.into(), Value::String(chunk.owner_id.clone()));
    payload.insert("source".into(), Value::String("uploaded_pdf".into()));
    payload.insert("uploaded_at".into(), Value::String(uploaded_at.into()));
    payload
}

/// Current wall-clock time formatted as RFC 3339.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
