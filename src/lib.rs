#![deny(missing_docs)]

//! Core library for the StudyMate backend.

/// HTTP routing and REST handlers.
pub mod api;
/// Retrieval orchestration, prompt assembly, and answer streaming.
pub mod chat;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// PDF text extraction.
pub mod extract;
/// Chat-completion client, token streaming, and query classification.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Document ingestion pipeline: chunking and batched embedding writes.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Serper web search client.
pub mod websearch;
