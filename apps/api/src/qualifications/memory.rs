//! In-memory qualification store. Backs tests and runs without
//! `DATABASE_URL` (non-durable degraded mode). Stickiness semantics match
//! the Postgres store: the first `notified_at` for a (job, user) pair wins.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::qualification::{JobRow, QualificationRecord, QualificationRow};
use crate::qualifications::{
    QualificationStore, StoreResultsOptions, StoreResultsOutcome,
};

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, JobRow>,
    rows: HashMap<(String, String), QualificationRow>,
}

#[derive(Default)]
pub struct MemoryQualificationStore {
    inner: RwLock<Inner>,
}

impl MemoryQualificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_job_row(inner: &mut Inner, job_id: &str, title: Option<&str>, is_active: Option<bool>) {
    let now = Utc::now();
    let row = inner.jobs.entry(job_id.to_string()).or_insert(JobRow {
        job_id: job_id.to_string(),
        title: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    });
    if let Some(title) = title {
        row.title = Some(title.to_string());
    }
    if let Some(active) = is_active {
        row.is_active = active;
    }
    row.updated_at = now;
}

#[async_trait]
impl QualificationStore for MemoryQualificationStore {
    async fn ensure_job(
        &self,
        job_id: &str,
        title: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        ensure_job_row(&mut inner, job_id, title, is_active);
        Ok(())
    }

    async fn job(&self, job_id: &str) -> Result<Option<JobRow>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.jobs.get(job_id).cloned())
    }

    async fn set_active(&self, job_id: &str, active: bool) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        ensure_job_row(&mut inner, job_id, None, Some(active));
        for ((row_job, _), row) in inner.rows.iter_mut() {
            if row_job == job_id {
                row.job_active = active;
            }
        }
        Ok(())
    }

    async fn store_results(
        &self,
        job_id: &str,
        results: &[QualificationRecord],
        opts: StoreResultsOptions<'_>,
    ) -> Result<StoreResultsOutcome, AppError> {
        let mut inner = self.inner.write().await;
        ensure_job_row(&mut inner, job_id, opts.job_title, None);
        let job_active = inner
            .jobs
            .get(job_id)
            .map(|j| j.is_active)
            .unwrap_or(true);

        let mark: HashSet<&str> = opts.mark_notified.iter().map(String::as_str).collect();
        let now = Utc::now();
        let mut outcome = StoreResultsOutcome::default();

        for record in results {
            let key = (job_id.to_string(), record.user_id.clone());
            let existing = inner.rows.get(&key);
            let (notified_at, notified_via) = match existing {
                Some(prior) if prior.notified_at.is_some() => {
                    (prior.notified_at, prior.notified_via.clone())
                }
                _ if mark.contains(record.user_id.as_str()) => (
                    Some(now),
                    opts.notified_via.map(String::from),
                ),
                _ => (None, None),
            };
            inner.rows.insert(
                key,
                QualificationRow {
                    job_id: job_id.to_string(),
                    user_id: record.user_id.clone(),
                    qualifies: record.qualifies,
                    final_score: record.final_score,
                    domain_score: record.domain_score,
                    task_score: record.task_score,
                    threshold_used: record.threshold_used,
                    filter_reason: record.filter_reason.clone(),
                    notified_at,
                    notified_via,
                    evaluated_at: now,
                    job_active,
                },
            );
            outcome.stored += 1;
        }

        Ok(outcome)
    }

    async fn qualifications(
        &self,
        job_id: &str,
        qualifies_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<QualificationRow>, AppError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<QualificationRow> = inner
            .rows
            .values()
            .filter(|r| r.job_id == job_id && (!qualifies_only || r.qualifies))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn pending(&self, job_id: &str) -> Result<Vec<QualificationRow>, AppError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<QualificationRow> = inner
            .rows
            .values()
            .filter(|r| {
                r.job_id == job_id && r.qualifies && r.notified_at.is_none() && r.job_active
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(rows)
    }

    async fn mark_notified(
        &self,
        job_id: &str,
        user_ids: &[String],
        notified_via: &str,
    ) -> Result<u64, AppError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut updated = 0u64;
        for user_id in user_ids {
            if let Some(row) = inner.rows.get_mut(&(job_id.to_string(), user_id.clone())) {
                if row.notified_at.is_none() {
                    row.notified_at = Some(now);
                    row.notified_via = Some(notified_via.to_string());
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn notified_user_ids(&self, job_id: &str) -> Result<HashSet<String>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .values()
            .filter(|r| r.job_id == job_id && r.notified_at.is_some())
            .map(|r| r.user_id.clone())
            .collect())
    }

    async fn delete_job(&self, job_id: &str) -> Result<u64, AppError> {
        let mut inner = self.inner.write().await;
        let before = inner.rows.len();
        inner.rows.retain(|(row_job, _), _| row_job != job_id);
        let deleted = (before - inner.rows.len()) as u64;
        inner.jobs.remove(job_id);
        Ok(deleted)
    }
}
