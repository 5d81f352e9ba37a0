//! Document ingestion pipeline: sentence chunking and batched embedding writes.

/// Sentence-boundary chunking helpers.
pub mod chunking;
/// Ingestion service and batch writer.
pub mod service;
/// Pipeline data types and errors.
pub mod types;

pub use chunking::chunk_page;
pub use service::IngestionService;
pub use types::{
    BatchError, ChunkingError, DocumentChunk, IngestError, IngestOutcome, UploadedDocument,
};
