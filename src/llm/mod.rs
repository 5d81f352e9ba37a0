//! Groq chat-completion client: single-shot answers, token streaming, and query
//! classification.
//!
//! The streaming call exposes the provider's SSE body as a `Stream` of content deltas.
//! Dropping the stream drops the underlying response, which releases the connection
//! regardless of whether the stream completed, errored, or was cancelled.

use crate::config::get_config;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors raised while talking to the chat-completion API.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP layer failed before receiving a response.
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected LLM response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Response body did not carry the expected completion shape.
    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),
    /// Classifier returned a label outside the closed enumeration.
    #[error("Unexpected classification label: {0}")]
    UnexpectedLabel(String),
}

/// One message in a chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Chat role (`system` or `user`).
    pub role: &'static str,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Intent category inferred for a user query. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClassification {
    /// Academic or study-material question.
    Study,
    /// Needs real-time or external data.
    WebSearch,
    /// Harmful or inappropriate content.
    Moderation,
    /// Small talk or unrelated chat.
    Misc,
    /// Apologies, corrections, or restatements.
    Sorry,
}

impl QueryClassification {
    /// Wire label for the classification.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::WebSearch => "web_search",
            Self::Moderation => "moderation",
            Self::Misc => "misc",
            Self::Sorry => "sorry",
        }
    }
}

impl std::str::FromStr for QueryClassification {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "study" => Ok(Self::Study),
            "web_search" => Ok(Self::WebSearch),
            "moderation" => Ok(Self::Moderation),
            "misc" => Ok(Self::Misc),
            "sorry" => Ok(Self::Sorry),
            other => Err(LlmError::UnexpectedLabel(other.to_string())),
        }
    }
}

/// HTTP client for the Groq chat-completion API.
pub struct LlmClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, LlmError> {
        let config = get_config();
        let client = Client::builder().user_agent("studymate/0.1").build()?;
        Ok(Self {
            client,
            api_url: config.groq_api_url.clone(),
            api_key: config.groq_api_key.clone(),
            model: config.groq_model.clone(),
        })
    }

    /// Request one complete answer for the supplied messages.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": 1000,
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::UnexpectedStatus { status, body });
        }

        let value: Value = response.json().await?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::MalformedResponse("missing choices[0].message.content".into())
            })
    }

    /// Open an incremental token stream for the supplied messages.
    ///
    /// Tokens are yielded in generation order. The stream ends when the provider sends
    /// its `[DONE]` marker or the body closes; transport failures surface as one `Err`
    /// item and the stream stops.
    pub async fn stream_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<impl Stream<Item = Result<String, LlmError>> + Send + 'static, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": 1000,
            "temperature": 0.7,
            "stream": true,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::UnexpectedStatus { status, body });
        }

        Ok(try_stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            let mut done = false;

            'body: while let Some(piece) = bytes.next().await {
                let piece = piece.map_err(LlmError::Http)?;
                buffer.push_str(&String::from_utf8_lossy(&piece));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    if line.strip_prefix("data: ") == Some("[DONE]") {
                        done = true;
                        break 'body;
                    }
                    if let Some(content) = delta_content(&line) {
                        yield content;
                    }
                }
            }

            // A body that closes without [DONE] can leave one unterminated frame.
            if !done && let Some(content) = delta_content(buffer.trim()) {
                yield content;
            }
        })
    }

    /// Classify a free-text query into one of the five intent categories.
    ///
    /// The categorical decision is delegated to the chat model; the returned label must
    /// be one of the enumerated values, anything else is an error rather than a default.
    pub async fn classify(&self, query: &str) -> Result<QueryClassification, LlmError> {
        let messages = vec![ChatMessage::system(classification_prompt(query))];
        let label = self.complete(&messages).await?;
        label.parse()
    }
}

/// Pull the delta token out of one SSE line. Malformed payload lines are
/// skipped, matching provider hiccups.
fn delta_content(line: &str) -> Option<String> {
    let data = line.strip_prefix("data: ")?;
    if data == "[DONE]" {
        return None;
    }
    let value = serde_json::from_str::<Value>(data).ok()?;
    let content = value["choices"][0]["delta"]["content"].as_str()?;
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

fn classification_prompt(query: &str) -> String {
    format!(
        "You are a query classification assistant for StudyMate, a math-aware AI mentor.\n\
         \n\
         Classify the query into one category:\n\
         - study: Academic, math, or study-related questions.\n\
         - web_search: Requires real-time or external data.\n\
         - moderation: Harmful or inappropriate content.\n\
         - misc: Small talk, jokes, unrelated chat.\n\
         - sorry: Apologies, corrections, or restatements.\n\
         \n\
         Return ONLY the category name.\n\
         \n\
         User query: \"{query}\"\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_parse() {
        for label in ["study", "web_search", "moderation", "misc", "sorry"] {
            let classification: QueryClassification = label.parse().expect("known label");
            assert_eq!(classification.as_str(), label);
        }
    }

    #[test]
    fn parse_tolerates_case_and_whitespace() {
        let classification: QueryClassification = "  Web_Search \n".parse().expect("label");
        assert_eq!(classification, QueryClassification::WebSearch);
    }

    #[test]
    fn out_of_set_label_is_an_error_not_a_default() {
        let error = "chitchat".parse::<QueryClassification>().unwrap_err();
        assert!(matches!(error, LlmError::UnexpectedLabel(label) if label == "chitchat"));
    }

    #[test]
    fn classification_prompt_embeds_the_query() {
        let prompt = classification_prompt("what is osmosis?");
        assert!(prompt.contains("what is osmosis?"));
        assert!(prompt.contains("Return ONLY the category name"));
    }

    fn client(api_url: String) -> LlmClient {
        LlmClient {
            client: Client::new(),
            api_url,
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
        }
    }

    #[tokio::test]
    async fn complete_extracts_the_first_choice_content() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer test-key")
                    .body_contains("test-model");
                then.status(200).json_body(serde_json::json!({
                    "choices": [{ "message": { "content": "study" } }]
                }));
            })
            .await;

        let answer = client(format!("{}/v1/chat/completions", server.base_url()))
            .complete(&[ChatMessage::system("classify this")])
            .await
            .expect("completion");

        mock.assert();
        assert_eq!(answer, "study");
    }

    #[tokio::test]
    async fn stream_completion_yields_deltas_and_skips_malformed_lines() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/v1/chat/completions")
                    .body_contains("\"stream\":true");
                then.status(200).body(concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                    "data: not json at all\n\n",
                    ": keep-alive comment\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
                    "data: [DONE]\n\n",
                ));
            })
            .await;

        let stream = client(format!("{}/v1/chat/completions", server.base_url()))
            .stream_completion(&[ChatMessage::user("hi")])
            .await
            .expect("stream opens");
        futures_util::pin_mut!(stream);

        let mut tokens = Vec::new();
        while let Some(token) = stream.next().await {
            tokens.push(token.expect("token"));
        }
        assert_eq!(tokens, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn stream_completion_flushes_a_trailing_frame_without_newline() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/v1/chat/completions")
                    .body_contains("last words");
                then.status(200).body(concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"almost\"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\" done\"}}]}",
                ));
            })
            .await;

        let stream = client(format!("{}/v1/chat/completions", server.base_url()))
            .stream_completion(&[ChatMessage::user("last words")])
            .await
            .expect("stream opens");
        futures_util::pin_mut!(stream);

        let mut tokens = Vec::new();
        while let Some(token) = stream.next().await {
            tokens.push(token.expect("token"));
        }
        assert_eq!(tokens, vec!["almost".to_string(), " done".to_string()]);
    }

    #[tokio::test]
    async fn non_success_status_is_surfaced_with_its_body() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST).path("/v1/chat/completions");
                then.status(429).body("rate limited");
            })
            .await;

        let error = client(format!("{}/v1/chat/completions", server.base_url()))
            .complete(&[ChatMessage::user("hi")])
            .await
            .expect_err("must fail");

        assert!(
            matches!(error, LlmError::UnexpectedStatus { status, ref body }
                if status == StatusCode::TOO_MANY_REQUESTS && body.as_str() == "rate limited")
        );
    }
}
