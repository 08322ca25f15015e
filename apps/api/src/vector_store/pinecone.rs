//! Pinecone data-plane client. REST over `reqwest`, with bounded retries on
//! 429/5xx/transport errors (delays ~200/500/1000ms plus jitter).

use std::collections::HashMap;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::vector_store::{
    is_retryable_status, QueryMatch, StoreError, VectorQuery, VectorRecord, VectorStore,
    RETRY_DELAYS_MS,
};

pub struct PineconeStore {
    client: Client,
    host: String,
    api_key: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct UpsertBody<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct FetchBody {
    #[serde(default)]
    vectors: HashMap<String, VectorRecord>,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    #[serde(rename = "includeValues")]
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponseBody {
    #[serde(default)]
    matches: Vec<RawMatch>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    id: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    id: &'a str,
    #[serde(rename = "setMetadata")]
    set_metadata: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteBody<'a> {
    ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

impl PineconeStore {
    pub fn new(host: String, api_key: String, dimension: usize) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            host,
            api_key,
            dimension,
        }
    }

    /// POSTs a JSON body, retrying transient failures. Returns the response
    /// body text on success.
    async fn post_with_retry<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String, StoreError> {
        let url = format!("{}{}", self.host, path);
        let mut last_error: Option<StoreError> = None;

        for attempt in 0..=RETRY_DELAYS_MS.len() {
            if attempt > 0 {
                let base = RETRY_DELAYS_MS[attempt - 1];
                let jitter = rand::thread_rng().gen_range(0..100);
                warn!(
                    "store call {path} attempt {attempt} failed, retrying after {}ms",
                    base + jitter
                );
                tokio::time::sleep(std::time::Duration::from_millis(base + jitter)).await;
            }

            let response = self
                .client
                .post(&url)
                .header("Api-Key", &self.api_key)
                .header("content-type", "application/json")
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    // Transport-level errors (connect, timeout) are transient.
                    last_error = Some(StoreError::Failure {
                        status: None,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();

            if is_retryable_status(status) {
                last_error = Some(StoreError::Failure {
                    status: Some(status),
                    message: text,
                });
                continue;
            }

            if !(200..300).contains(&status) {
                return Err(StoreError::Failure {
                    status: Some(status),
                    message: text,
                });
            }

            return Ok(text);
        }

        Err(last_error.unwrap_or(StoreError::Failure {
            status: None,
            message: "retries exhausted".to_string(),
        }))
    }

    fn check_dimension(&self, records: &[VectorRecord]) -> Result<(), StoreError> {
        for record in records {
            if record.values.len() != self.dimension {
                return Err(StoreError::InvalidVector {
                    expected: self.dimension,
                    actual: record.values.len(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(
        &self,
        namespace: Option<&str>,
        records: Vec<VectorRecord>,
    ) -> Result<(), StoreError> {
        self.check_dimension(&records)?;
        let body = UpsertBody {
            vectors: &records,
            namespace,
        };
        self.post_with_retry("/vectors/upsert", &body).await?;
        Ok(())
    }

    async fn fetch(
        &self,
        namespace: Option<&str>,
        ids: &[String],
    ) -> Result<HashMap<String, VectorRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        // Fetch is a GET with repeated `ids` parameters on the data plane.
        let url = format!("{}/vectors/fetch", self.host);
        let mut query: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        if let Some(ns) = namespace {
            query.push(("namespace", ns));
        }

        let mut last_error: Option<StoreError> = None;
        for attempt in 0..=RETRY_DELAYS_MS.len() {
            if attempt > 0 {
                let base = RETRY_DELAYS_MS[attempt - 1];
                let jitter = rand::thread_rng().gen_range(0..100);
                tokio::time::sleep(std::time::Duration::from_millis(base + jitter)).await;
            }

            let response = self
                .client
                .get(&url)
                .header("Api-Key", &self.api_key)
                .query(&query)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(StoreError::Failure {
                        status: None,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();

            if is_retryable_status(status) {
                last_error = Some(StoreError::Failure {
                    status: Some(status),
                    message: text,
                });
                continue;
            }

            if !(200..300).contains(&status) {
                return Err(StoreError::Failure {
                    status: Some(status),
                    message: text,
                });
            }

            let parsed: FetchBody =
                serde_json::from_str(&text).map_err(|e| StoreError::Failure {
                    status: None,
                    message: format!("malformed fetch response: {e}"),
                })?;
            return Ok(parsed.vectors);
        }

        Err(last_error.unwrap_or(StoreError::Failure {
            status: None,
            message: "retries exhausted".to_string(),
        }))
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
        let body = QueryBody {
            vector: &query.vector,
            top_k: query.top_k,
            filter: query.filter.as_ref(),
            namespace,
            include_metadata: true,
            include_values: false,
        };
        let text = self.post_with_retry("/query", &body).await?;
        let parsed: QueryResponseBody =
            serde_json::from_str(&text).map_err(|e| StoreError::Failure {
                status: None,
                message: format!("malformed query response: {e}"),
            })?;
        Ok(parsed
            .matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn update_metadata(
        &self,
        namespace: Option<&str>,
        ids: &[String],
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        // The data plane updates one vector per call.
        for id in ids {
            let body = UpdateBody {
                id,
                set_metadata: &patch,
                namespace,
            };
            self.post_with_retry("/vectors/update", &body).await?;
        }
        Ok(())
    }

    async fn delete(&self, namespace: Option<&str>, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let body = DeleteBody { ids, namespace };
        self.post_with_retry("/vectors/delete", &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_check_rejects_short_vector() {
        let store = PineconeStore::new("https://example".to_string(), "k".to_string(), 8);
        let records = vec![VectorRecord {
            id: "job_1::domain".to_string(),
            values: vec![0.0; 4],
            metadata: Map::new(),
        }];
        match store.check_dimension(&records) {
            Err(StoreError::InvalidVector { expected, actual }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 4);
            }
            other => panic!("expected InvalidVector, got {other:?}"),
        }
    }

    #[test]
    fn test_query_body_serializes_pinecone_field_names() {
        let filter = serde_json::json!({"type": "user"});
        let body = QueryBody {
            vector: &[0.5, 0.5],
            top_k: 10,
            filter: Some(&filter),
            namespace: Some("users"),
            include_metadata: true,
            include_values: false,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["topK"], 10);
        assert_eq!(value["includeMetadata"], true);
        assert_eq!(value["namespace"], "users");
    }
}
