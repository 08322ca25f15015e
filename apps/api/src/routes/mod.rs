pub mod health;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use crate::auth;
use crate::gateway;
use crate::ingest::handlers as ingest;
use crate::matching::handlers as matching;
use crate::qualifications::handlers as quals;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let v1 = Router::new()
        // ── Indexing ───────────────────────────────────────────────────────
        .route("/users/upsert", post(ingest::handle_user_upsert))
        .route("/users/:user_id", delete(ingest::handle_user_delete))
        .route("/jobs/upsert", post(ingest::handle_job_upsert))
        .route("/jobs/:job_id", delete(ingest::handle_job_delete))
        .route("/jobs/:job_id/metadata", patch(ingest::handle_job_metadata_patch))
        .route("/jobs/:job_id/status", patch(ingest::handle_job_status_patch))
        // ── Notify pipelines ───────────────────────────────────────────────
        .route("/jobs/notify", post(matching::handle_notify))
        .route("/jobs/:job_id/re-notify", post(matching::handle_re_notify))
        .route("/jobs/:job_id/evaluate", post(matching::handle_evaluate))
        // ── Qualifications ─────────────────────────────────────────────────
        .route(
            "/jobs/:job_id/qualifications",
            get(quals::handle_get_qualifications),
        )
        .route(
            "/jobs/:job_id/pending-notifications",
            get(quals::handle_get_pending),
        )
        .route("/jobs/:job_id/mark-notified", post(quals::handle_mark_notified))
        // ── Synchronous scoring ────────────────────────────────────────────
        .route(
            "/match/score_users_for_job",
            post(matching::handle_score_users_for_job),
        )
        .route(
            "/match/score_jobs_for_user",
            post(matching::handle_score_jobs_for_user),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/v1", v1)
        .layer(middleware::from_fn(gateway::propagate_request_id))
        .with_state(state)
}
