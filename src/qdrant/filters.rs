//! Typed filter builder for Qdrant queries.
//!
//! Every filter in this crate starts with an owner-id equality condition so that no read
//! or delete can cross tenant boundaries. Further conditions AND onto the filter; only
//! equality and contains-any matches exist, which is all retrieval and deletion need.

use serde_json::{Value, json};

/// Payload key holding the tenant identifier.
pub const OWNER_KEY: &str = "owner_id";
/// Payload key holding the source document name.
pub const DOCUMENT_KEY: &str = "doc_name";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Equals { key: &'static str, value: String },
    MatchAny { key: &'static str, values: Vec<String> },
}

/// Conjunctive payload filter, always scoped to one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    must: Vec<Condition>,
}

impl Filter {
    /// Start a filter scoped to a single owner. This is the only constructor.
    pub fn owner(owner_id: &str) -> Self {
        Self {
            must: vec![Condition::Equals {
                key: OWNER_KEY,
                value: owner_id.to_string(),
            }],
        }
    }

    /// AND an exact document-name condition onto the filter.
    pub fn and_document(mut self, document_name: &str) -> Self {
        self.must.push(Condition::Equals {
            key: DOCUMENT_KEY,
            value: document_name.to_string(),
        });
        self
    }

    /// AND a contains-any document-name condition onto the filter.
    ///
    /// Empty and whitespace-only names are dropped; an empty list leaves the filter
    /// unchanged rather than matching nothing.
    pub fn and_documents(mut self, document_names: &[String]) -> Self {
        let cleaned: Vec<String> = document_names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if !cleaned.is_empty() {
            self.must.push(Condition::MatchAny {
                key: DOCUMENT_KEY,
                values: cleaned,
            });
        }
        self
    }

    /// Render the filter as a Qdrant `must` clause.
    pub(crate) fn to_json(&self) -> Value {
        let must: Vec<Value> = self
            .must
            .iter()
            .map(|condition| match condition {
                Condition::Equals { key, value } => json!({
                    "key": key,
                    "match": { "value": value }
                }),
                Condition::MatchAny { key, values } => json!({
                    "key": key,
                    "match": { "any": values }
                }),
            })
            .collect();
        json!({ "must": must })
    }
}
