//! Core data types and error definitions for the ingestion pipeline.

use crate::{embedding::EmbeddingClientError, qdrant::QdrantError};
use thiserror::Error;

/// A bounded-length span of cleaned document text, the unit of embedding and retrieval.
///
/// Immutable once produced by the chunker; owned by the ingestion call that created it
/// until the batch writer commits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// 1-based page the text was extracted from.
    pub page_number: u32,
    /// Cleaned chunk text, non-empty and shorter than the configured chunk size
    /// (a single over-long sentence excepted).
    pub content: String,
    /// File name of the source document.
    pub document_name: String,
    /// Tenant that uploaded the document.
    pub owner_id: String,
}

/// One uploaded file, already validated at the HTTP boundary.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Declared file name.
    pub name: String,
    /// Raw PDF bytes.
    pub bytes: Vec<u8>,
}

/// Summary of a completed ingestion call.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOutcome {
    /// Number of documents that produced committed chunks.
    pub files_processed: usize,
    /// Total chunks committed across all documents of the call.
    pub chunks_created: usize,
}

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible chunk size.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Failure of a single embedding/commit batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Embedding provider failed to produce vectors for the batch.
    #[error("embedding generation failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Embedding generation exceeded the configured deadline.
    #[error("embedding generation timed out after {0}s")]
    Timeout(u64),
    /// Vector store rejected the batch write.
    #[error("vector store write failed: {0}")]
    Store(#[from] QdrantError),
}

/// Errors emitted by the document ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Chunking step failed to segment a document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// A batch failed; all prior batches of the call were rolled back best-effort.
    #[error("Failed to commit batch {batch} of {total}: {source}")]
    BatchFailed {
        /// 1-based index of the failing batch.
        batch: usize,
        /// Total batches planned for the call.
        total: usize,
        /// Underlying failure.
        #[source]
        source: BatchError,
    },
    /// Vector store interaction failed outside of a batch write.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
}
