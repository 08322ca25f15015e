use std::sync::Arc;

use crate::alerts::SlackAlerter;
use crate::audit::AuditSink;
use crate::classify::Classifier;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::matching::subject_gate::SubjectMatterGate;
use crate::qualifications::QualificationStore;
use crate::vector_store::VectorStore;

/// Shared application state injected into all route handlers via Axum
/// extractors. Every external collaborator sits behind a trait object so
/// tests swap in deterministic fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub classifier: Arc<dyn Classifier>,
    pub qualifications: Arc<dyn QualificationStore>,
    pub gate: Arc<SubjectMatterGate>,
    pub audit: AuditSink,
    pub alerts: SlackAlerter,
}

impl AppState {
    pub fn users_namespace(&self) -> Option<&str> {
        self.config.users_namespace.as_deref()
    }

    pub fn jobs_namespace(&self) -> Option<&str> {
        self.config.jobs_namespace.as_deref()
    }
}
