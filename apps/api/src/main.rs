mod alerts;
mod audit;
mod auth;
mod classify;
mod config;
mod db;
mod embedding;
mod errors;
mod gateway;
mod ingest;
mod llm_client;
mod matching;
mod models;
mod qualifications;
mod routes;
mod state;
#[cfg(test)]
mod test_support;
mod vector_store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::alerts::SlackAlerter;
use crate::audit::AuditSink;
use crate::classify::{Classifier, LlmClassifier};
use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::llm_client::LlmClient;
use crate::matching::subject_gate::SubjectMatterGate;
use crate::qualifications::{
    MemoryQualificationStore, PgQualificationStore, QualificationStore,
};
use crate::routes::build_router;
use crate::state::AppState;
use crate::vector_store::{PineconeStore, VectorStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting talentmatch API v{}", env!("CARGO_PKG_VERSION"));

    // Optional PostgreSQL: audit and durable qualifications
    let pool = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            Some(pool)
        }
        None => {
            warn!("DATABASE_URL not set; audit disabled, qualifications held in memory");
            None
        }
    };

    // Vector store (Pinecone data plane)
    let store: Arc<dyn VectorStore> = Arc::new(PineconeStore::new(
        config.pinecone_host.clone(),
        config.pinecone_api_key.clone(),
        config.embedding_dimension,
    ));
    info!(
        "Vector store client initialized (index: {}, dimension: {})",
        config.pinecone_index, config.embedding_dimension
    );

    // Embedding client
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
        config.openai_api_key.clone(),
        config.embedding_dimension,
    ));

    // LLM-backed classifier with deterministic heuristic fallback
    let llm = LlmClient::new(config.openai_api_key.clone(), config.capsule_model.clone());
    info!("LLM client initialized (model: {})", llm.model());
    let classifier: Arc<dyn Classifier> = Arc::new(LlmClassifier::new(llm));

    // Qualification store: Postgres when available, in-memory otherwise
    let qualifications: Arc<dyn QualificationStore> = match &pool {
        Some(pool) => Arc::new(PgQualificationStore::new(pool.clone())),
        None => Arc::new(MemoryQualificationStore::new()),
    };

    let audit = match &pool {
        Some(pool) => AuditSink::start(pool.clone()),
        None => AuditSink::disabled(),
    };

    if config.slack_webhook_url.is_none() {
        warn!("SLACK_WEBHOOK_URL not set; alerts disabled");
    }
    let alerts = SlackAlerter::new(config.slack_webhook_url.clone());

    let gate = Arc::new(SubjectMatterGate::new(Arc::clone(&embedder)));

    let state = AppState {
        config: config.clone(),
        store,
        embedder,
        classifier,
        qualifications,
        gate,
        audit,
        alerts,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
