//! The storage handle exposed to workflows (§6.1). Representation is opaque
//! to the core; concrete backends live in `loom-storage`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LoomResult;

/// A record stored in one of the opaque collections (issues, knowledge,
/// flows, pond). The `fields` map is the collection-specific payload; the
/// core never interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Value,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Value) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// A small query DSL: field equality plus a substring match against a
/// designated text field. Adequate for the opaque, core-agnostic contract
/// this trait exposes; it is not a claim about any production store's
/// physical query capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    pub equals: Vec<(String, Value)>,
    pub text_field: Option<String>,
    pub text_contains: Option<String>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.equals.push((field.into(), value));
        self
    }

    pub fn contains(mut self, field: impl Into<String>, text: impl Into<String>) -> Self {
        self.text_field = Some(field.into());
        self.text_contains = Some(text.into());
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        for (field, expected) in &self.equals {
            match record.fields.get(field) {
                Some(actual) if actual == expected => {}
                _ => return false,
            }
        }

        if let (Some(field), Some(needle)) = (&self.text_field, &self.text_contains) {
            let haystack = record
                .fields
                .get(field)
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !haystack.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }

        true
    }
}

/// One of the four opaque record collections a workflow may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Issues,
    Knowledge,
    Flows,
    Pond,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issues => "issues",
            Self::Knowledge => "knowledge",
            Self::Flows => "flows",
            Self::Pond => "pond",
        }
    }
}

/// Semantic storage operations consumed by workflow executors (§6.1).
///
/// Errors are `LoomError::Storage` with one of the `StorageErrorKind`
/// variants; backends should prefer `LoomError::not_found` /
/// `LoomError::conflict` / `LoomError::unavailable` / `LoomError::invalid`
/// over ad hoc error construction so callers can match on the taxonomy.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create(&self, collection: Collection, record: Record) -> LoomResult<Record>;
    async fn get(&self, collection: Collection, id: &str) -> LoomResult<Record>;
    async fn update(&self, collection: Collection, id: &str, fields: Value) -> LoomResult<Record>;
    async fn search(&self, collection: Collection, query: &Query) -> LoomResult<Vec<Record>>;

    /// Add an entry to the pond (free-form observation log). Convenience
    /// wrapper over `create` that generates an id if the record omits one.
    async fn pond_add(&self, entry: Value) -> LoomResult<Record> {
        self.create(Collection::Pond, Record::new(uuid::Uuid::new_v4(), entry))
            .await
    }

    /// Load the current state document, or the empty string if none exists.
    async fn load_state(&self) -> LoomResult<String>;

    /// Replace the state document atomically.
    async fn save_state(&self, value: &str) -> LoomResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_equals_filters_records() {
        let query = Query::new().eq("status", Value::String("open".into()));
        let matching = Record::new("1", serde_json::json!({"status": "open"}));
        let other = Record::new("2", serde_json::json!({"status": "closed"}));
        assert!(query.matches(&matching));
        assert!(!query.matches(&other));
    }

    #[test]
    fn query_contains_is_case_insensitive() {
        let query = Query::new().contains("title", "Kubectl");
        let record = Record::new("1", serde_json::json!({"title": "run kubectl get pods"}));
        assert!(query.matches(&record));
    }
}
