// Indexing pipeline: request normalization, classification, capsule texts,
// embedding, and vector upsert. All LLM calls go through llm_client; all
// embedding calls go through the Embedder seam.

pub mod capsule;
pub mod handlers;
pub mod normalize;

use crate::classify::{JobClassification, UserClassification};
use crate::errors::AppError;
use crate::models::job::{JobMetadata, NormalizedJobPosting};
use crate::models::user::{NormalizedUserProfile, UserMetadata};
use crate::models::{job_vector_id, user_vector_id, Section};
use crate::state::AppState;
use crate::vector_store::VectorRecord;

/// A fully indexed job: both capsules embedded and upserted, classification
/// and metadata in hand for the notify pipeline to reuse.
pub struct IndexedJob {
    pub job: NormalizedJobPosting,
    pub classification: JobClassification,
    pub metadata: JobMetadata,
    pub domain_embedding: Vec<f32>,
    pub task_embedding: Vec<f32>,
}

pub struct IndexedUser {
    pub profile: NormalizedUserProfile,
    pub classification: UserClassification,
    pub metadata: UserMetadata,
}

/// Classifies, embeds (both channels concurrently), and upserts a job.
/// Idempotent: re-indexing the same payload overwrites the same vector ids
/// with identical content.
pub async fn index_job(
    state: &AppState,
    job: NormalizedJobPosting,
) -> Result<IndexedJob, AppError> {
    let classification = state.classifier.classify_job(&job).await;
    let (domain_text, task_text) = capsule::build_job_capsules(&job, &classification);

    let (domain_embedding, task_embedding) = tokio::join!(
        state.embedder.embed(&domain_text),
        state.embedder.embed(&task_text)
    );
    let domain_embedding = domain_embedding?;
    let task_embedding = task_embedding?;

    let metadata = capsule::job_metadata(&job, &classification);
    let records = vec![
        VectorRecord {
            id: job_vector_id(&job.job_id, Section::Domain),
            values: domain_embedding.clone(),
            metadata: metadata.to_map(),
        },
        VectorRecord {
            id: job_vector_id(&job.job_id, Section::Task),
            values: task_embedding.clone(),
            metadata: metadata.with_section(Section::Task).to_map(),
        },
    ];
    state
        .store
        .upsert(state.jobs_namespace(), records)
        .await
        .map_err(|e| AppError::store("upsert", e.to_string()))?;

    Ok(IndexedJob {
        job,
        classification,
        metadata,
        domain_embedding,
        task_embedding,
    })
}

/// Classifies, embeds, and upserts a user profile.
pub async fn index_user(
    state: &AppState,
    profile: NormalizedUserProfile,
) -> Result<IndexedUser, AppError> {
    let classification = state.classifier.classify_user(&profile).await;
    let (domain_text, task_text) = capsule::build_user_capsules(&profile, &classification);

    let (domain_embedding, task_embedding) = tokio::join!(
        state.embedder.embed(&domain_text),
        state.embedder.embed(&task_text)
    );
    let domain_embedding = domain_embedding?;
    let task_embedding = task_embedding?;

    let metadata = capsule::user_metadata(&profile, &classification);
    let records = vec![
        VectorRecord {
            id: user_vector_id(&profile.user_id, Section::Domain),
            values: domain_embedding,
            metadata: metadata.to_map(),
        },
        VectorRecord {
            id: user_vector_id(&profile.user_id, Section::Task),
            values: task_embedding,
            metadata: metadata.with_section(Section::Task).to_map(),
        },
    ];
    state
        .store
        .upsert(state.users_namespace(), records)
        .await
        .map_err(|e| AppError::store("upsert", e.to_string()))?;

    Ok(IndexedUser {
        profile,
        classification,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, StubClassifier, StubEmbedder, TEST_DIMENSION};

    fn profile() -> NormalizedUserProfile {
        NormalizedUserProfile {
            user_id: "u1".to_string(),
            summary: "Radiologist".to_string(),
            skills: vec!["DICOM".to_string()],
            credentials: vec!["MD".to_string()],
            subject_matter_codes: vec!["medical:radiology".to_string()],
            years_experience: 8,
            has_labeling_experience: true,
            languages: vec!["English".to_string()],
            country: Some("US".to_string()),
        }
    }

    fn job() -> NormalizedJobPosting {
        NormalizedJobPosting {
            job_id: "j1".to_string(),
            title: Some("QA".to_string()),
            description: "Review annotations".to_string(),
            instructions: None,
            countries: vec![],
            languages: vec![],
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_index_user_upserts_both_sections() {
        let state = test_state(StubEmbedder::new(TEST_DIMENSION), StubClassifier::generic());
        index_user(&state, profile()).await.unwrap();

        let ids = vec!["usr_u1::domain".to_string(), "usr_u1::task".to_string()];
        let fetched = state.store.fetch(Some("users"), &ids).await.unwrap();
        assert_eq!(fetched.len(), 2);
        let domain = &fetched["usr_u1::domain"];
        assert_eq!(domain.metadata["type"], "user");
        assert_eq!(domain.metadata["section"], "domain");
        assert_eq!(domain.metadata["country"], "US");
    }

    #[tokio::test]
    async fn test_index_job_is_idempotent() {
        let state = test_state(StubEmbedder::new(TEST_DIMENSION), StubClassifier::generic());
        index_job(&state, job()).await.unwrap();
        let first = state
            .store
            .fetch(Some("jobs"), &["job_j1::domain".to_string()])
            .await
            .unwrap();

        index_job(&state, job()).await.unwrap();
        let second = state
            .store
            .fetch(Some("jobs"), &["job_j1::domain".to_string()])
            .await
            .unwrap();

        assert_eq!(first["job_j1::domain"].values, second["job_j1::domain"].values);
        assert_eq!(
            first["job_j1::domain"].metadata,
            second["job_j1::domain"].metadata
        );
    }

    #[tokio::test]
    async fn test_index_job_sections_share_metadata() {
        let state = test_state(
            StubEmbedder::new(TEST_DIMENSION),
            StubClassifier::specialized(&["medical:radiology"]),
        );
        let indexed = index_job(&state, job()).await.unwrap();
        assert_eq!(indexed.metadata.job_class.as_str(), "specialized");

        let ids = vec!["job_j1::domain".to_string(), "job_j1::task".to_string()];
        let fetched = state.store.fetch(Some("jobs"), &ids).await.unwrap();
        let mut domain_meta = fetched["job_j1::domain"].metadata.clone();
        let mut task_meta = fetched["job_j1::task"].metadata.clone();
        domain_meta.remove("section");
        task_meta.remove("section");
        assert_eq!(domain_meta, task_meta);
    }
}
