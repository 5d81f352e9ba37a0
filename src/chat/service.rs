//! Retrieval orchestration for chat queries.
//!
//! For each query: classify intent, then either search stored chunks (study mode),
//! run a live web search (web mode with a `web_search` classification), or answer
//! directly from the classification alone. "Nothing found" is a reified
//! [`Retrieval::NoContextFound`] variant so callers branch without error handling.

use crate::{
    chat::prompts,
    config::get_config,
    embedding::{EmbeddingClient, EmbeddingClientError},
    llm::{LlmClient, LlmError, QueryClassification},
    qdrant::{Filter, QdrantError, QdrantService},
    websearch::{self, WebSearchClient, WebSearchError},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Requested answer mode for a chat query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    /// Ground the answer in stored document chunks.
    StudyMaterial,
    /// Ground the answer in live web search results.
    WebSearch,
}

impl AnswerMode {
    /// Wire label for the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StudyMaterial => "study_material",
            Self::WebSearch => "web_search",
        }
    }
}

/// One chat query as received from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Free-text question; must be non-empty after trimming.
    pub message: String,
    /// Number of chunks to retrieve, within `[1, 8]`.
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    /// Requested grounding mode.
    #[serde(default = "default_search_mode")]
    pub search_mode: AnswerMode,
    /// Optional allow-list of document names to retrieve from.
    #[serde(default)]
    pub pdf_names: Option<Vec<String>>,
}

fn default_n_results() -> usize {
    5
}

fn default_search_mode() -> AnswerMode {
    AnswerMode::StudyMaterial
}

impl ChatRequest {
    /// Validate request fields, naming the violated constraint on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.message.trim().is_empty() {
            return Err("message must not be empty".into());
        }
        if !(1..=8).contains(&self.n_results) {
            return Err("n_results must be between 1 and 8".into());
        }
        Ok(())
    }
}

/// Grounding context built once per query and consumed once by the answer step.
#[derive(Debug, Clone)]
pub struct SearchContext {
    /// Mode the context was built for.
    pub answer_mode: AnswerMode,
    /// The user's query verbatim.
    pub original_query: String,
    /// Retrieved chunk texts in store ranking order.
    pub context: Vec<String>,
    /// Metadata maps parallel to `context`.
    pub metadata: Vec<Map<String, Value>>,
}

/// Outcome of a retrieval attempt.
#[derive(Debug, Clone)]
pub enum Retrieval {
    /// Relevant chunks or snippets were found.
    Found(SearchContext),
    /// Nothing matched; callers synthesize a fixed answer.
    NoContextFound,
}

/// Complete single-shot answer returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// Where the answer was grounded (`study_material`, `web_search`, or a
    /// classification label for direct answers).
    pub answer_source: String,
    /// Generated answer text.
    pub answer: String,
    /// Retrieved chunks backing the answer, ranking order preserved.
    pub relevant_chunks: Vec<String>,
    /// Metadata maps parallel to `relevant_chunks`.
    pub metadata: Vec<Map<String, Value>>,
}

impl ChatResponse {
    fn no_context(mode: AnswerMode) -> Self {
        let answer = match mode {
            AnswerMode::StudyMaterial => prompts::NO_STUDY_CONTEXT_ANSWER,
            AnswerMode::WebSearch => prompts::NO_WEB_CONTEXT_ANSWER,
        };
        Self {
            answer_source: mode.as_str().to_string(),
            answer: answer.to_string(),
            relevant_chunks: Vec::new(),
            metadata: Vec::new(),
        }
    }

    fn from_context(answer: String, context: SearchContext) -> Self {
        Self {
            answer_source: context.answer_mode.as_str().to_string(),
            answer,
            relevant_chunks: context.context,
            metadata: context.metadata,
        }
    }

    fn direct(answer: String, classification: QueryClassification) -> Self {
        Self {
            answer_source: classification.as_str().to_string(),
            answer,
            relevant_chunks: Vec::new(),
            metadata: Vec::new(),
        }
    }
}

/// Errors emitted while orchestrating a chat query.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Embedding provider failed to return a vector for the query text.
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store search failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Chat-completion or classification call failed.
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),
    /// Web search provider failed.
    #[error("Web search failed: {0}")]
    WebSearch(#[from] WebSearchError),
}

/// Orchestrates classification, retrieval, and answer generation for one query.
///
/// Shares the process-wide embedding client and Qdrant transport with the ingestion
/// service; construct once and share through an `Arc`.
pub struct ChatService {
    pub(crate) embedder: Arc<dyn EmbeddingClient>,
    pub(crate) store: Arc<QdrantService>,
    pub(crate) llm: LlmClient,
    pub(crate) web: WebSearchClient,
}

impl ChatService {
    /// Build a new chat service around shared clients.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<QdrantService>,
        llm: LlmClient,
        web: WebSearchClient,
    ) -> Self {
        Self {
            embedder,
            store,
            llm,
            web,
        }
    }

    /// Answer a query single-shot.
    pub async fn answer(
        &self,
        owner_id: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ChatError> {
        let classification = self.llm.classify(&request.message).await?;
        tracing::debug!(
            owner = owner_id,
            classification = classification.as_str(),
            mode = request.search_mode.as_str(),
            "Classified query"
        );

        match request.search_mode {
            AnswerMode::StudyMaterial => {
                match self.retrieve_study_context(owner_id, request).await? {
                    Retrieval::NoContextFound => {
                        Ok(ChatResponse::no_context(AnswerMode::StudyMaterial))
                    }
                    Retrieval::Found(context) => {
                        let messages = prompts::context_messages(&context);
                        let answer = self.llm.complete(&messages).await?;
                        Ok(ChatResponse::from_context(answer, context))
                    }
                }
            }
            AnswerMode::WebSearch => {
                if classification == QueryClassification::WebSearch {
                    match self.retrieve_web_context(request).await? {
                        Retrieval::NoContextFound => {
                            Ok(ChatResponse::no_context(AnswerMode::WebSearch))
                        }
                        Retrieval::Found(context) => {
                            let messages = prompts::context_messages(&context);
                            let answer = self.llm.complete(&messages).await?;
                            Ok(ChatResponse::from_context(answer, context))
                        }
                    }
                } else {
                    let messages = prompts::direct_messages(&request.message, classification);
                    let answer = self.llm.complete(&messages).await?;
                    Ok(ChatResponse::direct(answer, classification))
                }
            }
        }
    }

    /// Search stored chunks scoped to the owner, preserving the store's ranking.
    pub(crate) async fn retrieve_study_context(
        &self,
        owner_id: &str,
        request: &ChatRequest,
    ) -> Result<Retrieval, ChatError> {
        let config = get_config();
        let mut vectors = self
            .embedder
            .generate_embeddings(vec![request.message.clone()])
            .await?;
        let vector = vectors.pop().ok_or_else(|| {
            EmbeddingClientError::GenerationFailed("no vector returned for query".into())
        })?;

        let mut filter = Filter::owner(owner_id);
        if let Some(names) = &request.pdf_names {
            filter = filter.and_documents(names);
        }

        let hits = self
            .store
            .search_points(
                &config.qdrant_collection_name,
                vector,
                &filter,
                request.n_results,
            )
            .await?;

        let mut context = Vec::new();
        let mut metadata = Vec::new();
        for hit in hits {
            let Some(mut payload) = hit.payload else {
                continue;
            };
            let Some(Value::String(text)) = payload.remove("text") else {
                continue;
            };
            context.push(text);
            metadata.push(payload);
        }

        if context.is_empty() {
            return Ok(Retrieval::NoContextFound);
        }
        Ok(Retrieval::Found(SearchContext {
            answer_mode: AnswerMode::StudyMaterial,
            original_query: request.message.clone(),
            context,
            metadata,
        }))
    }

    /// Run a live web search and format organic snippets into grounding context.
    pub(crate) async fn retrieve_web_context(
        &self,
        request: &ChatRequest,
    ) -> Result<Retrieval, ChatError> {
        let limit = request.n_results.min(get_config().search_max_results);
        let results = self.web.search(&request.message, limit).await?;
        let context = websearch::format_contexts(&results);
        let metadata = websearch::format_metadata(&results);

        if context.is_empty() {
            return Ok(Retrieval::NoContextFound);
        }
        Ok(Retrieval::Found(SearchContext {
            answer_mode: AnswerMode::WebSearch,
            original_query: request.message.clone(),
            context,
            metadata,
        }))
    }
}
