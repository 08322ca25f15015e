//! Axum route handlers for qualification queries and notification
//! bookkeeping.

use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::AuditEvent;
use crate::errors::AppError;
use crate::gateway::{LenientJson, RequestId};
use crate::models::qualification::QualificationRow;
use crate::state::AppState;

const DEFAULT_PAGE_LIMIT: i64 = 100;
const MAX_PAGE_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct QualificationsQuery {
    #[serde(default)]
    pub qualifies_only: Option<bool>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QualificationsResponse {
    pub status: &'static str,
    pub job_id: String,
    pub count: usize,
    pub qualifications: Vec<QualificationRow>,
    pub elapsed_ms: u64,
}

/// GET /v1/jobs/:job_id/qualifications
pub async fn handle_get_qualifications(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<QualificationsQuery>,
) -> Result<Json<QualificationsResponse>, AppError> {
    let started = Instant::now();
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let qualifications = state
        .qualifications
        .qualifications(&job_id, params.qualifies_only.unwrap_or(false), limit, offset)
        .await?;

    Ok(Json(QualificationsResponse {
        status: "ok",
        job_id,
        count: qualifications.len(),
        qualifications,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub status: &'static str,
    pub job_id: String,
    pub pending_user_ids: Vec<String>,
    pub pending: Vec<QualificationRow>,
    pub elapsed_ms: u64,
}

/// GET /v1/jobs/:job_id/pending-notifications
pub async fn handle_get_pending(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<PendingResponse>, AppError> {
    let started = Instant::now();
    let pending = state.qualifications.pending(&job_id).await?;
    let pending_user_ids = pending.iter().map(|r| r.user_id.clone()).collect();

    Ok(Json(PendingResponse {
        status: "ok",
        job_id,
        pending_user_ids,
        pending,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MarkNotifiedRequest {
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub notified_via: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarkNotifiedResponse {
    pub status: &'static str,
    pub job_id: String,
    pub marked: u64,
    pub elapsed_ms: u64,
}

/// POST /v1/jobs/:job_id/mark-notified
pub async fn handle_mark_notified(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(job_id): Path<String>,
    LenientJson(request): LenientJson<MarkNotifiedRequest>,
) -> Result<Json<MarkNotifiedResponse>, AppError> {
    let started = Instant::now();
    if request.user_ids.is_empty() {
        return Err(AppError::Validation("user_ids must be non-empty".to_string()));
    }
    let notified_via = request.notified_via.as_deref().unwrap_or("manual");
    let marked = state
        .qualifications
        .mark_notified(&job_id, &request.user_ids, notified_via)
        .await?;

    state.audit.emit(
        AuditEvent::new("mark_notified")
            .request_id(request_id.0)
            .job_id(job_id.clone())
            .payload(json!({
                "user_ids": request.user_ids,
                "notified_via": notified_via,
                "marked": marked,
            })),
    );

    Ok(Json(MarkNotifiedResponse {
        status: "ok",
        job_id,
        marked,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }))
}
