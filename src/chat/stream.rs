//! Streaming answer assembly.
//!
//! Turns a grounding context (or none) plus the LLM token stream into an ordered
//! sequence of client-visible events. Every stream closes with exactly one terminal
//! event: `end` on success, `error` on failure. No `end` follows an `error`; once a
//! failure is reported the stream is over.

use crate::{
    chat::prompts,
    chat::service::{AnswerMode, ChatRequest, ChatService, Retrieval, SearchContext},
    llm::QueryClassification,
};
use async_stream::stream;
use futures_core::Stream;
use futures_util::{StreamExt, pin_mut};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Source attribution carried by the terminal `end` event.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventSource {
    /// A bare mode label, used when no chunks ground the answer.
    Label(String),
    /// Metadata maps for the chunks or snippets that grounded the answer.
    Metadata(Vec<Map<String, Value>>),
}

/// One client-visible event in a streamed answer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// One generated token, in generation order.
    Chunk {
        /// Token text.
        content: String,
        /// Active query classification label.
        classification: &'static str,
    },
    /// Terminal success marker, emitted exactly once.
    End {
        /// Active query classification label.
        classification: &'static str,
        /// Source attribution for the answer.
        source: EventSource,
    },
    /// Terminal failure marker; nothing follows it.
    Error {
        /// Human-readable cause.
        content: String,
    },
}

impl StreamEvent {
    fn chunk(content: impl Into<String>, classification: QueryClassification) -> Self {
        Self::Chunk {
            content: content.into(),
            classification: classification.as_str(),
        }
    }

    fn end(classification: QueryClassification, source: EventSource) -> Self {
        Self::End {
            classification: classification.as_str(),
            source,
        }
    }

    fn error(cause: impl std::fmt::Display) -> Self {
        Self::Error {
            content: format!("Error: {cause}"),
        }
    }
}

impl ChatService {
    /// Stream the answer for one query as an ordered event sequence.
    ///
    /// Dropping the returned stream (client disconnect) drops the in-flight LLM
    /// response and releases its connection.
    pub fn stream_events(
        self: Arc<Self>,
        owner_id: String,
        request: ChatRequest,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        stream! {
            let classification = match self.llm.classify(&request.message).await {
                Ok(classification) => classification,
                Err(error) => {
                    tracing::error!(error = %error, "Classification failed");
                    yield StreamEvent::error(error);
                    return;
                }
            };
            tracing::debug!(
                owner = %owner_id,
                classification = classification.as_str(),
                mode = request.search_mode.as_str(),
                "Streaming answer"
            );

            match request.search_mode {
                AnswerMode::StudyMaterial => {
                    let retrieval = match self.retrieve_study_context(&owner_id, &request).await {
                        Ok(retrieval) => retrieval,
                        Err(error) => {
                            yield StreamEvent::error(error);
                            return;
                        }
                    };
                    match retrieval {
                        Retrieval::NoContextFound => {
                            yield StreamEvent::chunk(prompts::NO_STUDY_CONTEXT_ANSWER, classification);
                            yield StreamEvent::end(
                                classification,
                                EventSource::Label(AnswerMode::StudyMaterial.as_str().into()),
                            );
                        }
                        Retrieval::Found(context) => {
                            let inner = self.clone().context_answer_stream(context, classification);
                            pin_mut!(inner);
                            while let Some(event) = inner.next().await {
                                yield event;
                            }
                        }
                    }
                }
                AnswerMode::WebSearch => {
                    if classification == QueryClassification::WebSearch {
                        let retrieval = match self.retrieve_web_context(&request).await {
                            Ok(retrieval) => retrieval,
                            Err(error) => {
                                yield StreamEvent::error(error);
                                return;
                            }
                        };
                        match retrieval {
                            Retrieval::NoContextFound => {
                                yield StreamEvent::chunk(prompts::NO_WEB_CONTEXT_ANSWER, classification);
                                yield StreamEvent::end(
                                    classification,
                                    EventSource::Label(AnswerMode::WebSearch.as_str().into()),
                                );
                            }
                            Retrieval::Found(context) => {
                                let inner = self.clone().context_answer_stream(context, classification);
                                pin_mut!(inner);
                                while let Some(event) = inner.next().await {
                                    yield event;
                                }
                            }
                        }
                    } else {
                        // Direct answer: no retrieved context, empty source list.
                        let messages = prompts::direct_messages(&request.message, classification);
                        let tokens = match self.llm.stream_completion(&messages).await {
                            Ok(tokens) => tokens,
                            Err(error) => {
                                yield StreamEvent::error(error);
                                return;
                            }
                        };
                        pin_mut!(tokens);
                        while let Some(token) = tokens.next().await {
                            match token {
                                Ok(content) => yield StreamEvent::chunk(content, classification),
                                Err(error) => {
                                    yield StreamEvent::error(error);
                                    return;
                                }
                            }
                        }
                        yield StreamEvent::end(classification, EventSource::Metadata(Vec::new()));
                    }
                }
            }
        }
    }

    /// Relay a context-grounded LLM stream, closing with one `end` carrying the
    /// context's source metadata.
    fn context_answer_stream(
        self: Arc<Self>,
        context: SearchContext,
        classification: QueryClassification,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        stream! {
            let messages = prompts::context_messages(&context);
            let tokens = match self.llm.stream_completion(&messages).await {
                Ok(tokens) => tokens,
                Err(error) => {
                    yield StreamEvent::error(error);
                    return;
                }
            };
            pin_mut!(tokens);
            while let Some(token) = tokens.next().await {
                match token {
                    Ok(content) => yield StreamEvent::chunk(content, classification),
                    Err(error) => {
                        yield StreamEvent::error(error);
                        return;
                    }
                }
            }
            yield StreamEvent::end(classification, EventSource::Metadata(context.metadata));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chunk_events_serialize_with_type_tag() {
        let event = StreamEvent::chunk("partial answer", QueryClassification::Study);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "chunk",
                "content": "partial answer",
                "classification": "study"
            })
        );
    }

    #[test]
    fn end_event_source_can_be_label_or_metadata() {
        let label = StreamEvent::end(
            QueryClassification::Study,
            EventSource::Label("study_material".into()),
        );
        assert_eq!(
            serde_json::to_value(&label).unwrap(),
            json!({
                "type": "end",
                "classification": "study",
                "source": "study_material"
            })
        );

        let mut map = Map::new();
        map.insert("doc_name".into(), Value::String("bio.pdf".into()));
        let metadata = StreamEvent::end(
            QueryClassification::Study,
            EventSource::Metadata(vec![map]),
        );
        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            json!({
                "type": "end",
                "classification": "study",
                "source": [{ "doc_name": "bio.pdf" }]
            })
        );
    }

    #[test]
    fn error_event_carries_a_readable_cause() {
        let event = StreamEvent::error("mid-stream failure");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "error");
        assert!(value["content"].as_str().unwrap().contains("mid-stream failure"));
    }
}
