//! Capsule store adapter. The rest of the service talks to the vector store
//! only through the `VectorStore` trait; `AppState` carries it as
//! `Arc<dyn VectorStore>` so tests and store-less development swap in the
//! in-memory backend.

pub mod memory;
pub mod pinecone;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;
pub use pinecone::PineconeStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("vector length {actual} does not match index dimension {expected}")]
    InvalidVector { expected: usize, actual: usize },

    #[error("store request failed{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Failure {
        status: Option<u16>,
        message: String,
    },
}

/// One stored vector with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A query by vector. `filter` is a metadata predicate in the store's filter
/// language: an object of `field: value` equality terms and `field: {"$in":
/// [...]}` terms, combined as a conjunction.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub filter: Option<Value>,
}

/// One query hit, ordered by descending similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or overwrites vectors. Vector length must equal the index
    /// dimension; same-id upserts overwrite.
    async fn upsert(
        &self,
        namespace: Option<&str>,
        records: Vec<VectorRecord>,
    ) -> Result<(), StoreError>;

    /// Fetches vectors by id. Missing ids are simply absent from the result.
    async fn fetch(
        &self,
        namespace: Option<&str>,
        ids: &[String],
    ) -> Result<HashMap<String, VectorRecord>, StoreError>;

    /// Queries by vector, returning up to `top_k` matches by descending score.
    async fn query(
        &self,
        namespace: Option<&str>,
        query: VectorQuery,
    ) -> Result<Vec<QueryMatch>, StoreError>;

    /// Partial metadata overwrite: keys absent from `patch` are preserved.
    async fn update_metadata(
        &self,
        namespace: Option<&str>,
        ids: &[String],
        patch: Map<String, Value>,
    ) -> Result<(), StoreError>;

    async fn delete(&self, namespace: Option<&str>, ids: &[String]) -> Result<(), StoreError>;
}

/// Backoff schedule for transient store errors: up to 3 extra attempts.
pub(crate) const RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn test_store_error_display_includes_status() {
        let err = StoreError::Failure {
            status: Some(503),
            message: "unavailable".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("503"), "{text}");
        assert!(text.contains("unavailable"), "{text}");
    }
}
