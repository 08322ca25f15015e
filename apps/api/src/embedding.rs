//! Embedding seam. Every capsule and specialty text is embedded through the
//! `Embedder` trait; the production implementation calls the OpenAI
//! embeddings API. Embedding failures are pipeline-blocking: there is no
//! fallback, unlike classification.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::errors::AppError;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const EMBEDDING_MODEL: &str = "text-embedding-3-large";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Embedding response missing vector for input {index}")]
    MissingVector { index: usize },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

impl From<EmbedError> for AppError {
    fn from(err: EmbedError) -> Self {
        AppError::Embedding(err.to_string())
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds one text into a cosine-normalized vector of `dimension()` floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embeds a batch, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn dimension(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

/// OpenAI embeddings client. Vectors are L2-normalized on receipt so cosine
/// similarity reduces to a dot product everywhere downstream.
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, dimension: usize) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            dimension,
        }
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let request_body = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: inputs,
            dimensions: self.dimension,
        };

        let mut last_error: Option<EmbedError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Embedding call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(OPENAI_EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(EmbedError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Embedding API returned {}: {}", status, body);
                last_error = Some(EmbedError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<OpenAiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(EmbedError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: EmbeddingResponse = response.json().await.map_err(EmbedError::Http)?;

            // The API may return data out of order; restore input order.
            let mut vectors: Vec<Option<Vec<f32>>> = vec![None; inputs.len()];
            for datum in parsed.data {
                if datum.index < vectors.len() {
                    vectors[datum.index] = Some(datum.embedding);
                }
            }
            return vectors
                .into_iter()
                .enumerate()
                .map(|(index, v)| {
                    let mut v = v.ok_or(EmbedError::MissingVector { index })?;
                    normalize_in_place(&mut v);
                    Ok(v)
                })
                .collect();
        }

        Err(last_error.unwrap_or(EmbedError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let inputs = [text.to_string()];
        let mut vectors = self.request(&inputs).await?;
        vectors
            .pop()
            .ok_or(EmbedError::MissingVector { index: 0 })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// L2-normalizes a vector in place. Zero vectors are left unchanged.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

/// Dot product of two equal-length vectors, in f64 for stable accumulation.
/// Over normalized vectors this is the cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| *x as f64 * *y as f64)
        .sum()
}
