//! Serper web search client.
//!
//! Only the organic results matter here; ranking internals stay on the provider side.

use crate::config::get_config;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Errors raised while performing a web search.
#[derive(Debug, Error)]
pub enum WebSearchError {
    /// HTTP layer failed before receiving a response.
    #[error("Web search failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected web search response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// One organic search result.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OrganicResult {
    /// Result title.
    #[serde(default)]
    pub title: String,
    /// Result URL.
    #[serde(default)]
    pub link: String,
    /// Text snippet used as grounding context.
    #[serde(default)]
    pub snippet: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

/// HTTP client for the Serper search API.
pub struct WebSearchClient {
    client: Client,
    search_url: String,
    api_key: String,
}

impl WebSearchClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, WebSearchError> {
        let config = get_config();
        let client = Client::builder().user_agent("studymate/0.1").build()?;
        Ok(Self {
            client,
            search_url: config.serper_api_url.clone(),
            api_key: config.serper_api_key.clone(),
        })
    }

    /// Perform a web search, returning at most `max_results` organic results in
    /// provider rank order.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<OrganicResult>, WebSearchError> {
        let response = self
            .client
            .post(&self.search_url)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WebSearchError::UnexpectedStatus { status, body });
        }

        let mut parsed: SearchResponse = response.json().await?;
        parsed.organic.truncate(max_results);
        Ok(parsed.organic)
    }
}

/// Extract non-empty snippets for use as grounding context.
pub fn format_contexts(results: &[OrganicResult]) -> Vec<String> {
    results
        .iter()
        .filter(|result| !result.snippet.is_empty())
        .map(|result| result.snippet.clone())
        .collect()
}

/// Build the metadata maps parallel to [`format_contexts`].
pub fn format_metadata(results: &[OrganicResult]) -> Vec<Map<String, Value>> {
    results
        .iter()
        .filter(|result| !result.snippet.is_empty())
        .map(|result| {
            let mut map = Map::new();
            map.insert("title".into(), Value::String(result.title.clone()));
            map.insert("link".into(), Value::String(result.link.clone()));
            map.insert("source".into(), Value::String("web_search".into()));
            map
        })
        .collect()
}
