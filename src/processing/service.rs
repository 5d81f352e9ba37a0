//! Ingestion service coordinating extraction, chunking, and batched embedding writes.

use crate::{
    config::get_config,
    embedding::EmbeddingClient,
    extract,
    metrics::{IngestMetrics, MetricsSnapshot},
    processing::{
        chunking::chunk_page,
        types::{BatchError, DocumentChunk, IngestError, IngestOutcome, UploadedDocument},
    },
    qdrant::{Filter, PointInsert, QdrantService, build_payload, chunk_point_id,
        current_timestamp_rfc3339},
};
use std::sync::Arc;
use std::time::Duration;

/// Coordinates the full ingestion pipeline: PDF extraction, sentence chunking, and
/// batched embedding commits with rollback.
///
/// Owns long-lived handles to the embedding client, Qdrant transport, and metrics
/// registry. Construct once near process start and share through an `Arc`.
pub struct IngestionService {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<QdrantService>,
    metrics: Arc<IngestMetrics>,
}

impl IngestionService {
    /// Build a new ingestion service around shared clients.
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<QdrantService>) -> Self {
        Self {
            embedder,
            store,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// Ingest a set of already-validated uploads for one owner.
    ///
    /// A document that fails to parse contributes zero chunks and is logged; remaining
    /// documents continue. All surviving chunks commit through one batch-writer call, so
    /// a commit failure anywhere rolls back the entire upload.
    pub async fn ingest(
        &self,
        owner_id: &str,
        documents: Vec<UploadedDocument>,
    ) -> Result<IngestOutcome, IngestError> {
        let config = get_config();
        let mut all_chunks = Vec::new();
        // (document name, chunk count) for metrics, recorded only after the commit.
        let mut per_document = Vec::new();

        for document in &documents {
            tracing::info!(owner = owner_id, document = %document.name, "Processing document");
            let pages = match extract::extract_pages(&document.bytes, config.max_pages_per_pdf) {
                Ok(pages) => pages,
                Err(error) => {
                    tracing::warn!(
                        owner = owner_id,
                        document = %document.name,
                        error = %error,
                        "Skipping unreadable document"
                    );
                    continue;
                }
            };

            let mut chunks = Vec::new();
            for (index, page) in pages.iter().enumerate() {
                let page_number = (index + 1) as u32;
                let page_chunks = chunk_page(
                    page,
                    config.chunk_size,
                    config.min_sentence_length,
                    config.max_chunks_per_page,
                    page_number,
                    &document.name,
                    owner_id,
                )?;
                chunks.extend(page_chunks);
            }

            if chunks.is_empty() {
                tracing::warn!(owner = owner_id, document = %document.name, "Document produced no chunks");
                continue;
            }

            per_document.push((document.name.clone(), chunks.len()));
            all_chunks.extend(chunks);
        }

        if all_chunks.is_empty() {
            return Ok(IngestOutcome::default());
        }

        let committed = self.index_chunks(owner_id, &all_chunks).await?;
        for (name, count) in &per_document {
            self.metrics.record_document(*count as u64);
            tracing::info!(owner = owner_id, document = %name, chunks = count, "Document ingested");
        }

        Ok(IngestOutcome {
            files_processed: per_document.len(),
            chunks_created: committed,
        })
    }

    /// Embed and commit chunks in bounded batches; all-or-nothing across batches.
    ///
    /// Batches commit strictly in input order. On a batch failure every id committed by
    /// prior batches of this call is deleted best-effort before the error surfaces;
    /// rollback failures are logged and never mask the original error. Returns the
    /// number of committed chunks.
    pub async fn index_chunks(
        &self,
        owner_id: &str,
        chunks: &[DocumentChunk],
    ) -> Result<usize, IngestError> {
        let config = get_config();
        let collection = &config.qdrant_collection_name;
        let batch_size = config.embedding_batch_size.max(1);
        let timeout = Duration::from_secs(config.embedding_timeout_secs);
        let total_batches = chunks.len().div_ceil(batch_size);

        let mut committed_ids: Vec<String> = Vec::new();
        let mut next_ordinal = 0usize;

        for (index, batch) in chunks.chunks(batch_size).enumerate() {
            let batch_number = index + 1;
            tracing::debug!(
                owner = owner_id,
                batch = batch_number,
                total = total_batches,
                size = batch.len(),
                "Processing batch"
            );

            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
            let embeddings =
                match tokio::time::timeout(timeout, self.embedder.generate_embeddings(texts)).await
                {
                    Ok(Ok(embeddings)) => embeddings,
                    Ok(Err(error)) => {
                        return self
                            .fail_batch(collection, &committed_ids, batch_number, total_batches, error.into())
                            .await;
                    }
                    Err(_) => {
                        return self
                            .fail_batch(
                                collection,
                                &committed_ids,
                                batch_number,
                                total_batches,
                                BatchError::Timeout(config.embedding_timeout_secs),
                            )
                            .await;
                    }
                };

            let uploaded_at = current_timestamp_rfc3339();
            let mut batch_ids = Vec::with_capacity(batch.len());
            let points: Vec<PointInsert> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, vector)| {
                    let id = chunk_point_id(
                        owner_id,
                        &chunk.document_name,
                        chunk.page_number,
                        next_ordinal,
                    );
                    next_ordinal += 1;
                    batch_ids.push(id.clone());
                    PointInsert {
                        id,
                        vector,
                        payload: build_payload(chunk, &uploaded_at),
                    }
                })
                .collect();

            if let Err(error) = self.store.upsert_points(collection, points).await {
                return self
                    .fail_batch(collection, &committed_ids, batch_number, total_batches, error.into())
                    .await;
            }

            committed_ids.extend(batch_ids);
        }

        Ok(committed_ids.len())
    }

    /// Roll back every prior committed id, then surface the batch failure.
    async fn fail_batch(
        &self,
        collection: &str,
        committed_ids: &[String],
        batch: usize,
        total: usize,
        source: BatchError,
    ) -> Result<usize, IngestError> {
        if !committed_ids.is_empty() {
            tracing::warn!(
                batch,
                total,
                rollback_points = committed_ids.len(),
                "Batch failed; rolling back previously committed points"
            );
            if let Err(rollback_error) = self.store.delete_points(collection, committed_ids).await
            {
                // Best-effort cleanup; the original failure is the one that surfaces.
                tracing::warn!(error = %rollback_error, "Rollback failed");
            }
        }
        Err(IngestError::BatchFailed {
            batch,
            total,
            source,
        })
    }

    /// Distinct document names stored for an owner.
    pub async fn list_documents(&self, owner_id: &str) -> Result<Vec<String>, IngestError> {
        let config = get_config();
        let names = self
            .store
            .list_documents(&config.qdrant_collection_name, &Filter::owner(owner_id))
            .await?;
        Ok(names.into_iter().collect())
    }

    /// Delete one document's chunks for an owner, returning how many were removed.
    pub async fn delete_document(
        &self,
        owner_id: &str,
        document_name: &str,
    ) -> Result<usize, IngestError> {
        let config = get_config();
        let deleted = self
            .store
            .delete_by_filter(
                &config.qdrant_collection_name,
                &Filter::owner(owner_id).and_document(document_name),
            )
            .await?;
        tracing::info!(owner = owner_id, document = document_name, deleted, "Document deleted");
        Ok(deleted)
    }

    /// Delete every chunk stored for an owner, returning how many were removed.
    pub async fn delete_all_documents(&self, owner_id: &str) -> Result<usize, IngestError> {
        let config = get_config();
        let deleted = self
            .store
            .delete_by_filter(&config.qdrant_collection_name, &Filter::owner(owner_id))
            .await?;
        tracing::info!(owner = owner_id, deleted, "All documents deleted");
        Ok(deleted)
    }

    /// Total points stored in the collection, across all owners.
    pub async fn collection_count(&self) -> Result<u64, IngestError> {
        let config = get_config();
        Ok(self
            .store
            .count_points(&config.qdrant_collection_name)
            .await?)
    }

    /// Return the current ingestion metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
