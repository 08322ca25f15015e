use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Authoritative job row. `is_active` gates pending-notification queries.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub job_id: String,
    pub title: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted per-(job, user) qualification record.
/// `notified_at` is sticky: once set it is never cleared by later rewrites.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QualificationRow {
    pub job_id: String,
    pub user_id: String,
    pub qualifies: bool,
    pub final_score: f64,
    pub domain_score: Option<f64>,
    pub task_score: Option<f64>,
    pub threshold_used: f64,
    pub filter_reason: Option<String>,
    pub notified_at: Option<DateTime<Utc>>,
    pub notified_via: Option<String>,
    pub evaluated_at: DateTime<Utc>,
    pub job_active: bool,
}

/// One scored user as produced by the notify/re-notify/evaluate pipelines,
/// before persistence bookkeeping is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualificationRecord {
    pub user_id: String,
    pub qualifies: bool,
    pub final_score: f64,
    pub domain_score: Option<f64>,
    pub task_score: Option<f64>,
    pub threshold_used: f64,
    pub filter_reason: Option<String>,
}
