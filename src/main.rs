//! StudyMate server binary.

use std::sync::Arc;

use studymate::{
    api::{AppState, create_router},
    chat::ChatService,
    config::{get_config, init_config},
    embedding::get_embedding_client,
    llm::LlmClient,
    logging::init_tracing,
    processing::IngestionService,
    qdrant::QdrantService,
    websearch::WebSearchClient,
};
use tokio::net::TcpListener;

const DEFAULT_PORT: u16 = 8000;
const PORT_SCAN_RANGE: u16 = 16;

#[tokio::main]
async fn main() {
    init_config();
    init_tracing();
    let config = get_config();

    let store = Arc::new(QdrantService::new().expect("Failed to build Qdrant client"));
    store
        .create_collection_if_not_exists(
            &config.qdrant_collection_name,
            config.embedding_dimension as u64,
        )
        .await
        .expect("Failed to ensure Qdrant collection");
    store
        .ensure_payload_indexes(&config.qdrant_collection_name)
        .await
        .expect("Failed to ensure Qdrant payload indexes");

    let embedder = get_embedding_client();
    let ingestion = Arc::new(IngestionService::new(embedder.clone(), store.clone()));
    let chat = Arc::new(ChatService::new(
        embedder,
        store,
        LlmClient::new().expect("Failed to build LLM client"),
        WebSearchClient::new().expect("Failed to build web search client"),
    ));

    let router = create_router(AppState { ingestion, chat });
    let listener = bind_listener(config.server_port).await;
    let addr = listener
        .local_addr()
        .expect("Failed to read bound address");
    tracing::info!(%addr, "StudyMate server listening");

    axum::serve(listener, router)
        .await
        .expect("Server terminated unexpectedly");
}

/// Bind to the configured port, or scan upward from the default when none is set.
async fn bind_listener(configured_port: Option<u16>) -> TcpListener {
    if let Some(port) = configured_port {
        return TcpListener::bind(("0.0.0.0", port))
            .await
            .unwrap_or_else(|err| panic!("Failed to bind port {port}: {err}"));
    }

    for port in DEFAULT_PORT..DEFAULT_PORT + PORT_SCAN_RANGE {
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => return listener,
            Err(err) => {
                tracing::warn!(port, error = %err, "Port unavailable, trying next");
            }
        }
    }
    panic!(
        "No free port in {}..{}",
        DEFAULT_PORT,
        DEFAULT_PORT + PORT_SCAN_RANGE
    );
}
