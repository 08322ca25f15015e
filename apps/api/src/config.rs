use anyhow::{Context, Result};
use tracing::warn;

/// Default chat model for classification when `OPENAI_CAPSULE_MODEL` is unset.
pub const DEFAULT_CAPSULE_MODEL: &str = "gpt-4o-mini";

/// Embedding dimension of the index. All vectors must match this length.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 3072;

/// Safety cap applied when a notify/re-notify request omits `max_notifications`.
pub const DEFAULT_MAX_NOTIFICATIONS: usize = 500;

/// Application configuration loaded from environment variables.
/// Startup fails with context if a required variable is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_api_key: String,
    pub openai_api_key: String,
    pub capsule_model: String,
    pub pinecone_api_key: String,
    pub pinecone_index: String,
    pub pinecone_host: String,
    pub users_namespace: Option<String>,
    pub jobs_namespace: Option<String>,
    pub database_url: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub embedding_dimension: usize,
    pub max_notifications_default: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let pinecone_index = require_env("PINECONE_INDEX")?;
        let pinecone_host = resolve_pinecone_host(&pinecone_index)?;

        let capsule_model = match std::env::var("OPENAI_CAPSULE_MODEL") {
            Ok(model) if !model.trim().is_empty() => model,
            _ => {
                warn!(
                    "OPENAI_CAPSULE_MODEL not set; falling back to {}",
                    DEFAULT_CAPSULE_MODEL
                );
                DEFAULT_CAPSULE_MODEL.to_string()
            }
        };

        Ok(Config {
            service_api_key: require_env("SERVICE_API_KEY")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            capsule_model,
            pinecone_api_key: require_env("PINECONE_API_KEY")?,
            pinecone_index,
            pinecone_host,
            users_namespace: optional_env("PINECONE_USERS_NAMESPACE"),
            jobs_namespace: optional_env("PINECONE_JOBS_NAMESPACE"),
            database_url: optional_env("DATABASE_URL"),
            slack_webhook_url: optional_env("SLACK_WEBHOOK_URL"),
            embedding_dimension: std::env::var("EMBEDDING_DIMENSION")
                .ok()
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("EMBEDDING_DIMENSION must be a positive integer")?
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            max_notifications_default: std::env::var("MAX_NOTIFICATIONS_DEFAULT")
                .ok()
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("MAX_NOTIFICATIONS_DEFAULT must be a positive integer")?
                .unwrap_or(DEFAULT_MAX_NOTIFICATIONS),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// One of `PINECONE_HOST` or `PINECONE_ENV` must be set; host wins when both are.
fn resolve_pinecone_host(index: &str) -> Result<String> {
    if let Some(host) = optional_env("PINECONE_HOST") {
        return Ok(normalize_host(&host));
    }
    let env = optional_env("PINECONE_ENV")
        .context("One of PINECONE_HOST or PINECONE_ENV must be set")?;
    Ok(format!("https://{index}.svc.{env}.pinecone.io"))
}

fn normalize_host(host: &str) -> String {
    let trimmed = host.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
