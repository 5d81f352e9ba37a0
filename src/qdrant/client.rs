//! HTTP client wrapper for interacting with Qdrant.

use crate::config::get_config;
use crate::qdrant::{
    filters::{DOCUMENT_KEY, Filter, OWNER_KEY},
    types::{
        CollectionInfoResponse, PointInsert, QdrantError, QueryResponse, QueryResponseResult,
        ScoredPoint, ScrollResponse,
    },
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::collections::BTreeSet;

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, QdrantError> {
        let config = get_config();
        let client = Client::builder().user_agent("studymate/0.1").build()?;

        let base_url = normalize_base_url(&config.qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(url = %base_url, "Initialized Qdrant HTTP client");

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
        })
    }

    /// Create a collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }

        tracing::debug!(
            collection = collection_name,
            vector_size,
            "Creating collection"
        );
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection created");
        })
        .await
    }

    /// Ensure payload indexes exist for the tenant and document filters.
    pub async fn ensure_payload_indexes(&self, collection_name: &str) -> Result<(), QdrantError> {
        let fields: [(&str, &str); 3] = [
            (OWNER_KEY, "keyword"),
            (DOCUMENT_KEY, "keyword"),
            ("page_number", "integer"),
        ];

        for (field, schema) in fields {
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });

            let response = self
                .request(Method::PUT, &format!("collections/{collection_name}/index"))?
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                tracing::debug!(collection = collection_name, field, "Payload index ensured");
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::warn!(collection = collection_name, field, error = %error, "Failed to ensure payload index");
            }
        }

        Ok(())
    }

    /// Upsert prepared points into the collection, returning the committed count.
    pub async fn upsert_points(
        &self,
        collection_name: &str,
        points: Vec<PointInsert>,
    ) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        let serialized: Vec<_> = points
            .into_iter()
            .map(|point| {
                json!({
                    "id": point.id,
                    "vector": point.vector,
                    "payload": point.payload,
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points upserted"
            );
        })
        .await?;

        Ok(point_count)
    }

    /// Perform a similarity search, always scoped by an owner filter.
    ///
    /// The result limit is capped at `SEARCH_MAX_RESULTS` no matter what the
    /// caller asks for.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let limit = limit.min(get_config().search_max_results);
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "filter": filter.to_json(),
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect();

        Ok(results)
    }

    /// Delete specific points by id. Used by the batch writer's rollback path.
    pub async fn delete_points(
        &self,
        collection_name: &str,
        ids: &[String],
    ) -> Result<(), QdrantError> {
        if ids.is_empty() {
            return Ok(());
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": ids }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = ids.len(),
                "Points deleted"
            );
        })
        .await
    }

    /// Delete every point matching the filter, returning how many were removed.
    ///
    /// Qdrant's filtered delete does not report a count, so ids are collected through the
    /// scroll API first and then deleted explicitly. A filter matching nothing deletes
    /// zero points and is not an error.
    pub async fn delete_by_filter(
        &self,
        collection_name: &str,
        filter: &Filter,
    ) -> Result<usize, QdrantError> {
        let ids: Vec<String> = self
            .scroll_points(collection_name, filter, false)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        self.delete_points(collection_name, &ids).await?;
        Ok(ids.len())
    }

    /// Enumerate distinct document names stored for the filter's owner.
    pub async fn list_documents(
        &self,
        collection_name: &str,
        filter: &Filter,
    ) -> Result<BTreeSet<String>, QdrantError> {
        let points = self.scroll_points(collection_name, filter, true).await?;
        let mut names = BTreeSet::new();
        for (_, payload) in points {
            if let Some(Value::String(name)) = payload.and_then(|mut map| map.remove(DOCUMENT_KEY))
            {
                let trimmed = name.trim();
                if !trimmed.is_empty() {
                    names.insert(trimmed.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Total number of points currently stored in the collection.
    pub async fn count_points(&self, collection_name: &str) -> Result<u64, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QdrantError::UnexpectedStatus { status, body });
        }

        let info: CollectionInfoResponse = response.json().await?;
        Ok(info.result.points_count.unwrap_or(0))
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    /// Page through every point matching the filter, optionally with payloads.
    async fn scroll_points(
        &self,
        collection: &str,
        filter: &Filter,
        with_payload: bool,
    ) -> Result<Vec<(String, Option<serde_json::Map<String, Value>>)>, QdrantError> {
        let mut offset: Option<Value> = None;
        let mut results = Vec::new();

        loop {
            let mut body = json!({
                "with_payload": with_payload,
                "with_vector": false,
                "limit": 512,
                "filter": filter.to_json(),
            });
            if let Some(next) = &offset {
                body.as_object_mut()
                    .expect("scroll body should remain an object")
                    .insert("offset".into(), next.clone());
            }

            let response = self
                .request(
                    Method::POST,
                    &format!("collections/{collection}/points/scroll"),
                )?
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection, error = %error, "Failed to scroll points");
                return Err(error);
            }

            let ScrollResponse { result } = response.json().await?;
            for point in result.points {
                if let Some(id) = point.id {
                    results.push((stringify_point_id(id), point.payload));
                }
            }

            match result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(results)
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
