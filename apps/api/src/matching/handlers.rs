//! Axum route handlers for the matching API: notify, re-notify, evaluate,
//! and the synchronous scoring endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::json;

use crate::audit::AuditEvent;
use crate::errors::AppError;
use crate::gateway::{LenientJson, RequestId};
use crate::matching::notify::{notify, NotifyRequest, NotifyResponse};
use crate::matching::renotify::{
    evaluate, re_notify, EvaluateResponse, ReNotifyRequest, ReNotifyResponse,
};
use crate::matching::score_api::{
    score_jobs_for_user, score_users_for_job, ScoreJobsForUserRequest,
    ScoreJobsForUserResponse, ScoreUsersForJobRequest, ScoreUsersForJobResponse,
};
use crate::state::AppState;

/// POST /v1/jobs/notify
pub async fn handle_notify(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    LenientJson(request): LenientJson<NotifyRequest>,
) -> Result<Json<NotifyResponse>, AppError> {
    let response = notify(&state, request, Some(request_id.0)).await?;
    Ok(Json(response))
}

/// POST /v1/jobs/:job_id/re-notify
pub async fn handle_re_notify(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(job_id): Path<String>,
    LenientJson(request): LenientJson<ReNotifyRequest>,
) -> Result<Json<ReNotifyResponse>, AppError> {
    let response = re_notify(&state, &job_id, request, Some(request_id.0)).await?;
    Ok(Json(response))
}

/// POST /v1/jobs/:job_id/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(job_id): Path<String>,
    LenientJson(request): LenientJson<ReNotifyRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let response = evaluate(&state, &job_id, request, Some(request_id.0)).await?;
    Ok(Json(response))
}

/// POST /v1/match/score_users_for_job
pub async fn handle_score_users_for_job(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    LenientJson(request): LenientJson<ScoreUsersForJobRequest>,
) -> Result<Json<ScoreUsersForJobResponse>, AppError> {
    let response = score_users_for_job(&state, request).await?;

    state.audit.emit(
        AuditEvent::new("score_users_for_job")
            .request_id(request_id.0)
            .job_id(response.job_id.clone())
            .payload(json!({
                "job_class": response.job_class,
                "candidates": response.results.len(),
                "missing_domain": response.missing_vectors.domain.len(),
                "missing_task": response.missing_vectors.task.len(),
                "suggested_threshold": response.suggested_threshold.value,
            })),
    );

    Ok(Json(response))
}

/// POST /v1/match/score_jobs_for_user
pub async fn handle_score_jobs_for_user(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    LenientJson(request): LenientJson<ScoreJobsForUserRequest>,
) -> Result<Json<ScoreJobsForUserResponse>, AppError> {
    let response = score_jobs_for_user(&state, request).await?;

    state.audit.emit(
        AuditEvent::new("score_jobs_for_user")
            .request_id(request_id.0)
            .user_id(response.user_id.clone())
            .payload(json!({
                "jobs": response.results.len(),
                "missing_jobs": response.missing_jobs.len(),
            })),
    );

    Ok(Json(response))
}
