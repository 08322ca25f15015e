//! Axum route handlers for indexing: user/job upsert, delete, and job
//! metadata/status patches.

use std::time::Instant;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::audit::AuditEvent;
use crate::errors::AppError;
use crate::gateway::{LenientJson, RequestId};
use crate::ingest::normalize::{
    canonicalize_languages, normalize_job, normalize_user, JobUpsertRequest, UserUpsertRequest,
};
use crate::ingest::{index_job, index_user};
use crate::models::job::JobClass;
use crate::models::{job_vector_id, user_vector_id, Section};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserUpsertResponse {
    pub status: &'static str,
    pub user_id: String,
    pub vector_ids: Vec<String>,
    pub classification_confidence: f64,
    pub elapsed_ms: u64,
}

/// POST /v1/users/upsert
pub async fn handle_user_upsert(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    LenientJson(request): LenientJson<UserUpsertRequest>,
) -> Result<Json<UserUpsertResponse>, AppError> {
    let started = Instant::now();
    let profile = normalize_user(request)?;
    let indexed = index_user(&state, profile).await?;

    state.audit.emit(
        AuditEvent::new("user_upsert")
            .request_id(request_id.0.clone())
            .user_id(indexed.profile.user_id.clone())
            .payload(json!({
                "expertise_tier": indexed.classification.expertise_tier,
                "subject_matter_codes": indexed.classification.subject_matter_codes,
                "classification_source": indexed.classification.source,
                "confidence": indexed.classification.confidence,
            })),
    );

    Ok(Json(UserUpsertResponse {
        status: "ok",
        vector_ids: vec![
            user_vector_id(&indexed.profile.user_id, Section::Domain),
            user_vector_id(&indexed.profile.user_id, Section::Task),
        ],
        user_id: indexed.profile.user_id,
        classification_confidence: indexed.classification.confidence,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: &'static str,
    pub deleted_vector_ids: Vec<String>,
    pub elapsed_ms: u64,
}

/// DELETE /v1/users/:user_id
pub async fn handle_user_delete(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let started = Instant::now();
    let ids = vec![
        user_vector_id(&user_id, Section::Domain),
        user_vector_id(&user_id, Section::Task),
    ];
    state
        .store
        .delete(state.users_namespace(), &ids)
        .await
        .map_err(|e| AppError::store("delete", e.to_string()))?;

    state.audit.emit(
        AuditEvent::new("user_delete")
            .request_id(request_id.0)
            .user_id(user_id),
    );

    Ok(Json(DeleteResponse {
        status: "ok",
        deleted_vector_ids: ids,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}

#[derive(Debug, Serialize)]
pub struct JobUpsertResponse {
    pub status: &'static str,
    pub job_id: String,
    pub job_class: JobClass,
    pub classification_confidence: f64,
    pub vector_ids: Vec<String>,
    pub elapsed_ms: u64,
}

/// POST /v1/jobs/upsert
pub async fn handle_job_upsert(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    LenientJson(request): LenientJson<JobUpsertRequest>,
) -> Result<Json<JobUpsertResponse>, AppError> {
    let started = Instant::now();
    let job = normalize_job(request)?;
    let indexed = index_job(&state, job).await?;

    state
        .qualifications
        .ensure_job(
            &indexed.job.job_id,
            indexed.job.title.as_deref(),
            Some(indexed.job.is_active),
        )
        .await?;

    state.audit.emit(
        AuditEvent::new("job_upsert")
            .request_id(request_id.0)
            .job_id(indexed.job.job_id.clone())
            .payload(json!({
                "job_class": indexed.classification.job_class,
                "classification_source": indexed.classification.source,
                "confidence": indexed.classification.confidence,
                "subject_matter_codes": indexed.metadata.subject_matter_codes,
            })),
    );

    Ok(Json(JobUpsertResponse {
        status: "ok",
        vector_ids: vec![
            job_vector_id(&indexed.job.job_id, Section::Domain),
            job_vector_id(&indexed.job.job_id, Section::Task),
        ],
        job_id: indexed.job.job_id,
        job_class: indexed.classification.job_class,
        classification_confidence: indexed.classification.confidence,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}

/// DELETE /v1/jobs/:job_id
pub async fn handle_job_delete(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let started = Instant::now();
    let ids = vec![
        job_vector_id(&job_id, Section::Domain),
        job_vector_id(&job_id, Section::Task),
    ];
    state
        .store
        .delete(state.jobs_namespace(), &ids)
        .await
        .map_err(|e| AppError::store("delete", e.to_string()))?;
    let deleted_rows = state.qualifications.delete_job(&job_id).await?;

    state.audit.emit(
        AuditEvent::new("job_delete")
            .request_id(request_id.0)
            .job_id(job_id)
            .payload(json!({ "deleted_qualifications": deleted_rows })),
    );

    Ok(Json(DeleteResponse {
        status: "ok",
        deleted_vector_ids: ids,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}

#[derive(Debug, Deserialize)]
pub struct JobMetadataPatch {
    #[serde(default)]
    pub countries: Option<Vec<String>>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct JobMetadataPatchResponse {
    pub status: &'static str,
    pub job_id: String,
    pub updated_vector_ids: Vec<String>,
    pub elapsed_ms: u64,
}

/// PATCH /v1/jobs/:job_id/metadata. Updates countries/languages on both
/// sections. Keys absent from the patch are preserved by the store.
pub async fn handle_job_metadata_patch(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(job_id): Path<String>,
    LenientJson(patch): LenientJson<JobMetadataPatch>,
) -> Result<Json<JobMetadataPatchResponse>, AppError> {
    let started = Instant::now();

    let mut metadata_patch = Map::new();
    if let Some(countries) = &patch.countries {
        metadata_patch.insert("countries".to_string(), json!(countries));
    }
    if let Some(languages) = &patch.languages {
        metadata_patch.insert(
            "languages".to_string(),
            json!(canonicalize_languages(languages)),
        );
    }
    if metadata_patch.is_empty() {
        return Err(AppError::Validation(
            "provide countries and/or languages".to_string(),
        ));
    }

    let ids = vec![
        job_vector_id(&job_id, Section::Domain),
        job_vector_id(&job_id, Section::Task),
    ];
    state
        .store
        .update_metadata(state.jobs_namespace(), &ids, metadata_patch.clone())
        .await
        .map_err(|e| AppError::store("update_metadata", e.to_string()))?;

    state.audit.emit(
        AuditEvent::new("job_metadata_patch")
            .request_id(request_id.0)
            .job_id(job_id.clone())
            .payload(Value::Object(metadata_patch)),
    );

    Ok(Json(JobMetadataPatchResponse {
        status: "ok",
        job_id,
        updated_vector_ids: ids,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}

#[derive(Debug, Deserialize)]
pub struct JobStatusPatch {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct JobStatusPatchResponse {
    pub status: &'static str,
    pub job_id: String,
    pub is_active: bool,
    pub elapsed_ms: u64,
}

/// PATCH /v1/jobs/:job_id/status
pub async fn handle_job_status_patch(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(job_id): Path<String>,
    LenientJson(patch): LenientJson<JobStatusPatch>,
) -> Result<Json<JobStatusPatchResponse>, AppError> {
    let started = Instant::now();
    state.qualifications.set_active(&job_id, patch.is_active).await?;

    state.audit.emit(
        AuditEvent::new("job_status_patch")
            .request_id(request_id.0)
            .job_id(job_id.clone())
            .payload(json!({ "is_active": patch.is_active })),
    );

    Ok(Json(JobStatusPatchResponse {
        status: "ok",
        job_id,
        is_active: patch.is_active,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}
