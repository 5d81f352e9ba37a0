//! Qdrant integration: REST transport, typed filters, and payload helpers.

mod client;
mod filters;
mod payload;
mod types;

pub use client::QdrantService;
pub use filters::{DOCUMENT_KEY, Filter, OWNER_KEY};
pub use payload::{build_payload, chunk_point_id, current_timestamp_rfc3339};
pub use types::{PointInsert, QdrantError, ScoredPoint};
