//! Chat orchestration against mocked Groq and Qdrant backends.

use std::sync::Arc;

use futures_util::{StreamExt, pin_mut};
use httpmock::{Method::POST, MockServer};
use serde_json::json;
use studymate::{
    chat::{AnswerMode, ChatRequest, ChatService, NO_STUDY_CONTEXT_ANSWER, StreamEvent},
    config,
    embedding::HashingEmbedder,
    llm::LlmClient,
    processing::{DocumentChunk, IngestionService},
    qdrant::{QdrantService, chunk_point_id},
    websearch::WebSearchClient,
};
use tokio::sync::OnceCell;

static INIT: OnceCell<&'static MockServer> = OnceCell::const_new();

fn set_env(key: &str, value: &str) {
    // SAFETY: Tests establish deterministic configuration before any reads.
    unsafe { std::env::set_var(key, value) }
}

async fn mock_server() -> &'static MockServer {
    INIT.get_or_init(|| async {
        let server: &'static MockServer = Box::leak(Box::new(MockServer::start_async().await));
        set_env("QDRANT_URL", &server.base_url());
        set_env("QDRANT_COLLECTION_NAME", "studymate-test");
        set_env("EMBEDDING_DIMENSION", "16");
        set_env("GROQ_API_KEY", "test-key");
        set_env("GROQ_API_URL", &format!("{}/v1/chat/completions", server.base_url()));
        set_env("SERPER_API_KEY", "test-key");
        set_env("SERPER_API_URL", &format!("{}/search", server.base_url()));
        config::init_config();
        server
    })
    .await
}

fn service() -> ChatService {
    let embedder = Arc::new(HashingEmbedder::new());
    let store = Arc::new(QdrantService::new().expect("qdrant client"));
    ChatService::new(
        embedder,
        store,
        LlmClient::new().expect("llm client"),
        WebSearchClient::new().expect("web client"),
    )
}

fn study_request(message: &str) -> ChatRequest {
    ChatRequest {
        message: message.to_string(),
        n_results: 5,
        search_mode: AnswerMode::StudyMaterial,
        pdf_names: None,
    }
}

fn classification_body(label: &str) -> serde_json::Value {
    json!({ "choices": [{ "message": { "content": label } }] })
}

#[tokio::test]
async fn study_mode_returns_fixed_answer_when_owner_has_no_chunks() {
    let server = mock_server().await;
    let query = "what did isolated-owner upload about osmosis";

    let _classify = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("query classification assistant")
                .body_contains("isolated-owner upload about osmosis");
            then.status(200).json_body(classification_body("study"));
        })
        .await;
    let search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/studymate-test/points/query")
                .body_contains("isolated-owner");
            then.status(200)
                .json_body(json!({ "status": "ok", "result": { "points": [] } }));
        })
        .await;

    let response = service()
        .answer("isolated-owner", &study_request(query))
        .await
        .expect("chat answer");

    assert_eq!(response.answer, NO_STUDY_CONTEXT_ANSWER);
    assert_eq!(response.answer_source, "study_material");
    assert!(response.relevant_chunks.is_empty());
    assert_eq!(search.hits_async().await, 1);
}

#[tokio::test]
async fn study_mode_grounds_the_answer_in_owner_scoped_chunks() {
    let server = mock_server().await;
    let query = "explain grounded-owner notes on diffusion";

    let _classify = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("query classification assistant")
                .body_contains("grounded-owner notes on diffusion");
            then.status(200).json_body(classification_body("study"));
        })
        .await;
    // The owner equality condition must appear in the search request body.
    let search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/studymate-test/points/query")
                .body_contains(r#""key":"owner_id""#)
                .body_contains("grounded-owner");
            then.status(200).json_body(json!({
                "status": "ok",
                "result": {
                    "points": [{
                        "id": "11111111-1111-5111-8111-111111111111",
                        "score": 0.92,
                        "payload": {
                            "text": "Diffusion moves solutes down the gradient.",
                            "doc_name": "bio.pdf",
                            "page_number": 3
                        }
                    }]
                }
            }));
        })
        .await;
    let completion = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("Diffusion moves solutes down the gradient.");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "content": "Solutes diffuse toward equilibrium." } }]
            }));
        })
        .await;

    let response = service()
        .answer("grounded-owner", &study_request(query))
        .await
        .expect("chat answer");

    assert_eq!(response.answer, "Solutes diffuse toward equilibrium.");
    assert_eq!(response.answer_source, "study_material");
    assert_eq!(
        response.relevant_chunks,
        vec!["Diffusion moves solutes down the gradient.".to_string()]
    );
    assert_eq!(response.metadata[0]["doc_name"], "bio.pdf");
    assert_eq!(search.hits_async().await, 1);
    assert_eq!(completion.hits_async().await, 1);
}

#[tokio::test]
async fn stream_emits_chunks_then_exactly_one_terminal_event() {
    let server = mock_server().await;
    let query = "summarize streaming-owner chapter on cells";

    let _classify = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("query classification assistant")
                .body_contains("streaming-owner chapter on cells");
            then.status(200).json_body(classification_body("study"));
        })
        .await;
    let _search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/studymate-test/points/query")
                .body_contains("streaming-owner");
            then.status(200).json_body(json!({
                "status": "ok",
                "result": {
                    "points": [{
                        "id": "22222222-2222-5222-8222-222222222222",
                        "score": 0.88,
                        "payload": {
                            "text": "Cells are the unit of streaming-owner life.",
                            "doc_name": "cells.pdf",
                            "page_number": 1
                        }
                    }]
                }
            }));
        })
        .await;
    let _stream = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains(r#""stream":true"#)
                .body_contains("Cells are the unit of streaming-owner life.");
            then.status(200).body(concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Cells \"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"divide.\"}}]}\n\n",
                "data: [DONE]\n\n",
            ));
        })
        .await;

    let events = Arc::new(service()).stream_events("streaming-owner".into(), study_request(query));
    pin_mut!(events);
    let mut collected = Vec::new();
    while let Some(event) = events.next().await {
        collected.push(event);
    }

    let terminal_count = collected
        .iter()
        .filter(|event| matches!(event, StreamEvent::End { .. } | StreamEvent::Error { .. }))
        .count();
    assert_eq!(terminal_count, 1, "exactly one terminal event");
    assert!(matches!(collected.last(), Some(StreamEvent::End { .. })));

    let answer: String = collected
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Chunk { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(answer, "Cells divide.");
}

#[tokio::test]
async fn failed_stream_ends_with_one_error_and_no_end() {
    let server = mock_server().await;
    let query = "summarize failing-owner notes on meiosis";

    let _classify = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("query classification assistant")
                .body_contains("failing-owner notes on meiosis");
            then.status(200).json_body(classification_body("study"));
        })
        .await;
    let _search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/studymate-test/points/query")
                .body_contains("failing-owner");
            then.status(200).json_body(json!({
                "status": "ok",
                "result": {
                    "points": [{
                        "id": "33333333-3333-5333-8333-333333333333",
                        "score": 0.81,
                        "payload": {
                            "text": "Meiosis halves the failing-owner chromosome count.",
                            "doc_name": "meiosis.pdf",
                            "page_number": 2
                        }
                    }]
                }
            }));
        })
        .await;
    let _stream = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains(r#""stream":true"#)
                .body_contains("Meiosis halves the failing-owner chromosome count.");
            then.status(500).body("upstream unavailable");
        })
        .await;

    let events = Arc::new(service()).stream_events("failing-owner".into(), study_request(query));
    pin_mut!(events);
    let mut collected = Vec::new();
    while let Some(event) = events.next().await {
        collected.push(event);
    }

    assert!(
        matches!(collected.last(), Some(StreamEvent::Error { content }) if content.starts_with("Error: ")),
        "stream must close with an error event"
    );
    let terminal_count = collected
        .iter()
        .filter(|event| matches!(event, StreamEvent::End { .. } | StreamEvent::Error { .. }))
        .count();
    assert_eq!(terminal_count, 1, "exactly one terminal event");
    assert!(
        collected
            .iter()
            .all(|event| !matches!(event, StreamEvent::End { .. })),
        "no end event may follow a failure"
    );
}

#[tokio::test]
async fn ingested_chunks_are_retrievable_by_their_owner() {
    let server = mock_server().await;
    let owner = "roundtrip-owner";
    let chunk_text = "Mitochondria produce ATP for roundtrip-owner.";

    let upsert = server
        .mock_async(|when, then| {
            when.method(httpmock::Method::PUT)
                .path("/collections/studymate-test/points")
                .body_contains("roundtrip-owner");
            then.status(200)
                .json_body(json!({ "status": "ok", "result": { "status": "completed" } }));
        })
        .await;

    let ingestion = IngestionService::new(
        Arc::new(HashingEmbedder::new()),
        Arc::new(QdrantService::new().expect("qdrant client")),
    );
    let chunks = vec![DocumentChunk {
        page_number: 1,
        content: chunk_text.to_string(),
        document_name: "energy.pdf".to_string(),
        owner_id: owner.to_string(),
    }];
    let committed = ingestion
        .index_chunks(owner, &chunks)
        .await
        .expect("commit succeeds");
    assert_eq!(committed, 1);
    assert_eq!(upsert.hits_async().await, 1);

    let point_id = chunk_point_id(owner, "energy.pdf", 1, 0);
    let query = "how does roundtrip-owner make energy";
    let _classify = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("query classification assistant")
                .body_contains("roundtrip-owner make energy");
            then.status(200).json_body(classification_body("study"));
        })
        .await;
    let _search = server
        .mock_async(move |when, then| {
            when.method(POST)
                .path("/collections/studymate-test/points/query")
                .body_contains("roundtrip-owner");
            then.status(200).json_body(json!({
                "status": "ok",
                "result": {
                    "points": [{
                        "id": point_id,
                        "score": 0.95,
                        "payload": {
                            "text": chunk_text,
                            "doc_name": "energy.pdf",
                            "page_number": 1,
                            "owner_id": "roundtrip-owner"
                        }
                    }]
                }
            }));
        })
        .await;
    let _completion = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("Mitochondria produce ATP for roundtrip-owner.");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "content": "Through cellular respiration." } }]
            }));
        })
        .await;

    let response = service()
        .answer(owner, &study_request(query))
        .await
        .expect("chat answer");

    assert_eq!(response.answer, "Through cellular respiration.");
    assert_eq!(response.relevant_chunks, vec![chunk_text.to_string()]);
}

#[tokio::test]
async fn direct_answers_carry_the_classification_as_source() {
    let server = mock_server().await;
    let query = "tell direct-owner a short joke";

    let _classify = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("query classification assistant")
                .body_contains("direct-owner a short joke");
            then.status(200).json_body(classification_body("misc"));
        })
        .await;
    let completion = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("direct-owner a short joke")
                .body_contains("Query classification: misc");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "content": "Why did the proton stay positive?" } }]
            }));
        })
        .await;

    let request = ChatRequest {
        message: query.to_string(),
        n_results: 5,
        search_mode: AnswerMode::WebSearch,
        pdf_names: None,
    };
    let response = service()
        .answer("direct-owner", &request)
        .await
        .expect("chat answer");

    assert_eq!(response.answer_source, "misc");
    assert_eq!(response.answer, "Why did the proton stay positive?");
    assert!(response.relevant_chunks.is_empty());
    assert_eq!(completion.hits_async().await, 1);
}
