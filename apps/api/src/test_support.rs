//! Deterministic fakes shared by the pipeline tests: a stub embedder with
//! fixed vectors, a pass-through classifier, and an `AppState` builder wired
//! to the in-memory backends.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;

use crate::alerts::SlackAlerter;
use crate::audit::AuditSink;
use crate::classify::{
    ClassificationSource, Classifier, JobClassification, JobRequirements, UserClassification,
};
use crate::config::Config;
use crate::embedding::{normalize_in_place, EmbedError, Embedder};
use crate::matching::subject_gate::SubjectMatterGate;
use crate::models::job::{ExpertiseTier, JobClass, NormalizedJobPosting, Strictness};
use crate::models::user::NormalizedUserProfile;
use crate::qualifications::MemoryQualificationStore;
use crate::state::AppState;
use crate::vector_store::MemoryStore;

/// Small embedding dimension used throughout the pipeline tests.
pub const TEST_DIMENSION: usize = 4;

pub fn test_config() -> Config {
    Config {
        service_api_key: "test-key".to_string(),
        openai_api_key: "sk-test".to_string(),
        capsule_model: "test-model".to_string(),
        pinecone_api_key: "pc-test".to_string(),
        pinecone_index: "test-index".to_string(),
        pinecone_host: "https://test-index.svc.test.pinecone.io".to_string(),
        users_namespace: Some("users".to_string()),
        jobs_namespace: Some("jobs".to_string()),
        database_url: None,
        slack_webhook_url: None,
        embedding_dimension: TEST_DIMENSION,
        max_notifications_default: 500,
        port: 0,
        rust_log: "info".to_string(),
    }
}

/// An `AppState` over the in-memory store and qualification backends, with
/// the given stub embedder/classifier shared by the pipelines and the gate.
pub fn test_state(embedder: StubEmbedder, classifier: impl Classifier + 'static) -> AppState {
    let embedder: Arc<dyn Embedder> = Arc::new(embedder);
    AppState {
        config: test_config(),
        store: Arc::new(MemoryStore::new(TEST_DIMENSION)),
        embedder: Arc::clone(&embedder),
        classifier: Arc::new(classifier),
        qualifications: Arc::new(MemoryQualificationStore::new()),
        gate: Arc::new(SubjectMatterGate::new(embedder)),
        audit: AuditSink::disabled(),
        alerts: SlackAlerter::new(None),
    }
}

/// Embedder returning pre-registered vectors by exact text. Unregistered
/// text gets a hash-derived unit vector, or the first-axis unit vector when
/// built with `with_default_axis` (handy for tests that seed candidate
/// vectors with exact similarities). Always normalized.
pub struct StubEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    axis_default: bool,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            axis_default: false,
        }
    }

    /// Unregistered text embeds to `[1, 0, …, 0]` instead of a hash vector.
    pub fn with_default_axis(mut self) -> Self {
        self.axis_default = true;
        self
    }

    pub fn with(mut self, text: &str, mut vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension, "stub vector dimension");
        normalize_in_place(&mut vector);
        self.vectors.insert(text.to_string(), vector);
        self
    }

    fn fallback_vector(&self, text: &str) -> Vec<f32> {
        if self.axis_default {
            let mut vector = vec![0.0; self.dimension];
            vector[0] = 1.0;
            return vector;
        }
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();
        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            vector.push(((seed >> 33) as f32 / u32::MAX as f32) - 0.5);
        }
        normalize_in_place(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback_vector(text)))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Classifier returning a fixed job classification; user classifications are
/// derived directly from the profile.
pub struct StubClassifier {
    pub job_class: JobClass,
    pub confidence: f64,
    pub subject_matter_codes: Vec<String>,
    pub acceptable_subject_codes: Vec<String>,
    pub subject_matter_strictness: Strictness,
}

impl StubClassifier {
    pub fn generic() -> Self {
        Self {
            job_class: JobClass::Generic,
            confidence: 0.9,
            subject_matter_codes: vec![],
            acceptable_subject_codes: vec![],
            subject_matter_strictness: Strictness::Moderate,
        }
    }

    pub fn specialized(codes: &[&str]) -> Self {
        Self {
            job_class: JobClass::Specialized,
            confidence: 0.9,
            subject_matter_codes: codes.iter().map(|c| c.to_string()).collect(),
            acceptable_subject_codes: vec![],
            subject_matter_strictness: Strictness::Moderate,
        }
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify_job(&self, job: &NormalizedJobPosting) -> JobClassification {
        JobClassification {
            job_class: self.job_class,
            confidence: self.confidence,
            requirements: JobRequirements {
                subject_matter_codes: self.subject_matter_codes.clone(),
                acceptable_subject_codes: self.acceptable_subject_codes.clone(),
                subject_matter_strictness: self.subject_matter_strictness,
                countries: job.countries.clone(),
                languages: job.languages.clone(),
                ..Default::default()
            },
            reasoning: "stub".to_string(),
            source: ClassificationSource::Llm,
        }
    }

    async fn classify_user(&self, profile: &NormalizedUserProfile) -> UserClassification {
        UserClassification {
            expertise_tier: ExpertiseTier::Intermediate,
            credentials: profile.credentials.clone(),
            subject_matter_codes: profile.subject_matter_codes.clone(),
            years_experience: profile.years_experience,
            has_labeling_experience: profile.has_labeling_experience,
            confidence: 0.9,
            source: ClassificationSource::Llm,
        }
    }
}
