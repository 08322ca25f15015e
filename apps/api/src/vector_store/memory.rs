//! In-memory vector store backend. Used by tests and by store-less local
//! development; implements the same metadata filter language as the hosted
//! store (`$eq` implicit, `$in`, conjunction) and scores by dot product over
//! normalized vectors.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::embedding::dot;
use crate::vector_store::{QueryMatch, StoreError, VectorQuery, VectorRecord, VectorStore};

const FLAT_NAMESPACE: &str = "";

#[derive(Default)]
pub struct MemoryStore {
    dimension: usize,
    namespaces: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl MemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    fn namespace_key(namespace: Option<&str>) -> String {
        namespace.unwrap_or(FLAT_NAMESPACE).to_string()
    }

    fn lock_poisoned() -> StoreError {
        StoreError::Failure {
            status: None,
            message: "memory store lock poisoned".to_string(),
        }
    }
}

/// Evaluates a conjunction filter against a metadata map. Equality terms
/// match scalars directly and list fields by containment; `$in` matches if
/// the field value (or any element of a list field) appears in the set.
pub fn matches_filter(metadata: &Map<String, Value>, filter: &Value) -> bool {
    let Some(terms) = filter.as_object() else {
        return true;
    };
    terms.iter().all(|(field, condition)| {
        let Some(actual) = metadata.get(field) else {
            return false;
        };
        match condition.as_object().and_then(|obj| obj.get("$in")) {
            Some(Value::Array(allowed)) => match actual {
                Value::Array(elements) => elements.iter().any(|e| allowed.contains(e)),
                scalar => allowed.contains(scalar),
            },
            Some(_) => false,
            None => match actual {
                Value::Array(elements) => elements.contains(condition),
                scalar => scalar == condition,
            },
        }
    })
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(
        &self,
        namespace: Option<&str>,
        records: Vec<VectorRecord>,
    ) -> Result<(), StoreError> {
        for record in &records {
            if record.values.len() != self.dimension {
                return Err(StoreError::InvalidVector {
                    expected: self.dimension,
                    actual: record.values.len(),
                });
            }
        }
        let mut namespaces = self.namespaces.write().map_err(|_| Self::lock_poisoned())?;
        let space = namespaces.entry(Self::namespace_key(namespace)).or_default();
        for record in records {
            space.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn fetch(
        &self,
        namespace: Option<&str>,
        ids: &[String],
    ) -> Result<HashMap<String, VectorRecord>, StoreError> {
        let namespaces = self.namespaces.read().map_err(|_| Self::lock_poisoned())?;
        let Some(space) = namespaces.get(&Self::namespace_key(namespace)) else {
            return Ok(HashMap::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| space.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }

    async fn query(
        &self,
        namespace: Option<&str>,
        query: VectorQuery,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        if query.vector.len() != self.dimension {
            return Err(StoreError::InvalidVector {
                expected: self.dimension,
                actual: query.vector.len(),
            });
        }
        let namespaces = self.namespaces.read().map_err(|_| Self::lock_poisoned())?;
        let Some(space) = namespaces.get(&Self::namespace_key(namespace)) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<QueryMatch> = space
            .values()
            .filter(|record| {
                query
                    .filter
                    .as_ref()
                    .map(|f| matches_filter(&record.metadata, f))
                    .unwrap_or(true)
            })
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: dot(&query.vector, &record.values),
                metadata: record.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(query.top_k);
        Ok(matches)
    }

    async fn update_metadata(
        &self,
        namespace: Option<&str>,
        ids: &[String],
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().map_err(|_| Self::lock_poisoned())?;
        if let Some(space) = namespaces.get_mut(&Self::namespace_key(namespace)) {
            for id in ids {
                if let Some(record) = space.get_mut(id) {
                    for (key, value) in &patch {
                        record.metadata.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, namespace: Option<&str>, ids: &[String]) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().map_err(|_| Self::lock_poisoned())?;
        if let Some(space) = namespaces.get_mut(&Self::namespace_key(namespace)) {
            for id in ids {
                space.remove(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, values: Vec<f32>, metadata: Value) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_filter_equality_and_in() {
        let meta = json!({
            "type": "user",
            "section": "domain",
            "languages": ["English", "Polish"],
            "country": "PL",
        });
        let meta = meta.as_object().unwrap();

        assert!(matches_filter(meta, &json!({"type": "user"})));
        assert!(matches_filter(meta, &json!({"languages": "Polish"})));
        assert!(matches_filter(
            meta,
            &json!({"languages": {"$in": ["English"]}})
        ));
        assert!(matches_filter(
            meta,
            &json!({"country": {"$in": ["PL", "SK"]}})
        ));
        assert!(matches_filter(
            meta,
            &json!({"type": "user", "section": "domain"})
        ));

        assert!(!matches_filter(meta, &json!({"type": "job"})));
        assert!(!matches_filter(
            meta,
            &json!({"languages": {"$in": ["German"]}})
        ));
        assert!(!matches_filter(meta, &json!({"missing_field": "x"})));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_fetch_skips_missing() {
        let store = MemoryStore::new(2);
        store
            .upsert(None, vec![record("a", vec![1.0, 0.0], json!({"v": 1}))])
            .await
            .unwrap();
        store
            .upsert(None, vec![record("a", vec![0.0, 1.0], json!({"v": 2}))])
            .await
            .unwrap();

        let fetched = store
            .fetch(None, &["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched["a"].values, vec![0.0, 1.0]);
        assert_eq!(fetched["a"].metadata["v"], 2);
    }

    #[tokio::test]
    async fn test_query_orders_by_score_and_respects_top_k() {
        let store = MemoryStore::new(2);
        store
            .upsert(
                None,
                vec![
                    record("far", vec![0.0, 1.0], json!({"type": "user"})),
                    record("near", vec![1.0, 0.0], json!({"type": "user"})),
                    record("mid", vec![0.6, 0.8], json!({"type": "user"})),
                ],
            )
            .await
            .unwrap();

        let matches = store
            .query(
                None,
                VectorQuery {
                    vector: vec![1.0, 0.0],
                    top_k: 2,
                    filter: Some(json!({"type": "user"})),
                },
            )
            .await
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "near");
        assert_eq!(matches[1].id, "mid");
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = MemoryStore::new(2);
        store
            .upsert(Some("users"), vec![record("a", vec![1.0, 0.0], json!({}))])
            .await
            .unwrap();

        let in_jobs = store.fetch(Some("jobs"), &["a".to_string()]).await.unwrap();
        assert!(in_jobs.is_empty());

        let in_users = store
            .fetch(Some("users"), &["a".to_string()])
            .await
            .unwrap();
        assert_eq!(in_users.len(), 1);
    }

    #[tokio::test]
    async fn test_update_metadata_preserves_unpatched_keys() {
        let store = MemoryStore::new(2);
        store
            .upsert(
                None,
                vec![record("a", vec![1.0, 0.0], json!({"keep": "x", "patch": "old"}))],
            )
            .await
            .unwrap();

        let patch = json!({"patch": "new"}).as_object().cloned().unwrap();
        store
            .update_metadata(None, &["a".to_string()], patch)
            .await
            .unwrap();

        let fetched = store.fetch(None, &["a".to_string()]).await.unwrap();
        assert_eq!(fetched["a"].metadata["keep"], "x");
        assert_eq!(fetched["a"].metadata["patch"], "new");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_invalid_vector() {
        let store = MemoryStore::new(3);
        let result = store
            .upsert(None, vec![record("a", vec![1.0, 0.0], json!({}))])
            .await;
        assert!(matches!(result, Err(StoreError::InvalidVector { .. })));
    }
}
