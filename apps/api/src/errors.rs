use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Job vectors missing: {0}")]
    JobVectorsMissing(String),

    #[error("User vectors missing: {0}")]
    UserVectorsMissing(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Unprocessable weights: {0}")]
    UnprocessableWeights(String),

    #[error("Vector store failure in phase {phase}: {message}")]
    Store { phase: String, message: String },

    #[error("LLM failure: {0}")]
    Llm(String),

    #[error("Embedding failure: {0}")]
    Embedding(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Wraps a store-adapter failure with the pipeline phase it occurred in
    /// (`fetch.job`, `query.domain`, `query.task`, `upsert`, `update_metadata`).
    pub fn store(phase: &str, message: impl Into<String>) -> Self {
        AppError::Store {
            phase: phase.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or invalid bearer token".to_string(),
                None,
            ),
            AppError::JobVectorsMissing(msg) => (
                StatusCode::NOT_FOUND,
                "JOB_VECTORS_MISSING",
                msg.clone(),
                None,
            ),
            AppError::UserVectorsMissing(msg) => (
                StatusCode::NOT_FOUND,
                "USER_VECTORS_MISSING",
                msg.clone(),
                None,
            ),
            AppError::JobNotFound(job_id) => (
                StatusCode::NOT_FOUND,
                "JOB_NOT_FOUND",
                format!("Job {job_id} has no indexed vectors"),
                None,
            ),
            AppError::UnprocessableWeights(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_WEIGHTS",
                msg.clone(),
                None,
            ),
            AppError::Store { phase, message } => {
                tracing::error!(phase = %phase, "Vector store failure: {message}");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORE_FAILURE",
                    "The vector store request failed after retries".to_string(),
                    Some(json!({ "phase": phase })),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM failure: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_FAILURE",
                    "An upstream model call failed".to_string(),
                    None,
                )
            }
            AppError::Embedding(msg) => {
                tracing::error!("Embedding failure: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "EMBEDDING_FAILURE",
                    "The embedding service call failed".to_string(),
                    None,
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "status": "error",
            "code": code,
            "message": message,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}
