//! Qualification store. The single source of truth for notification
//! bookkeeping: `notified_at` is write-sticky at the store level, so no
//! in-process locking is needed for stickiness.

pub mod handlers;
pub mod memory;
pub mod pg;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::qualification::{JobRow, QualificationRecord, QualificationRow};

pub use memory::MemoryQualificationStore;
pub use pg::PgQualificationStore;

#[derive(Debug, Default, Clone)]
pub struct StoreResultsOutcome {
    pub stored: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct StoreResultsOptions<'a> {
    /// Users to stamp `notified_at = now()` for (sticky: earlier stamps win).
    pub mark_notified: &'a [String],
    pub notified_via: Option<&'a str>,
    pub job_title: Option<&'a str>,
}

#[async_trait]
pub trait QualificationStore: Send + Sync {
    /// Creates the job row if absent; updates title/active when provided.
    async fn ensure_job(
        &self,
        job_id: &str,
        title: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<(), AppError>;

    async fn job(&self, job_id: &str) -> Result<Option<JobRow>, AppError>;

    /// Sets the active flag, including the denormalized `job_active` on all
    /// qualification rows for the job.
    async fn set_active(&self, job_id: &str, active: bool) -> Result<(), AppError>;

    /// Upserts one row per scored user, keyed `(job_id, user_id)`. A single
    /// failed row is logged and counted, never aborts the batch.
    async fn store_results(
        &self,
        job_id: &str,
        results: &[QualificationRecord],
        opts: StoreResultsOptions<'_>,
    ) -> Result<StoreResultsOutcome, AppError>;

    async fn qualifications(
        &self,
        job_id: &str,
        qualifies_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<QualificationRow>, AppError>;

    /// Qualifying, un-notified rows for an active job.
    async fn pending(&self, job_id: &str) -> Result<Vec<QualificationRow>, AppError>;

    async fn mark_notified(
        &self,
        job_id: &str,
        user_ids: &[String],
        notified_via: &str,
    ) -> Result<u64, AppError>;

    /// Users with a prior `notified_at` for this job.
    async fn notified_user_ids(&self, job_id: &str) -> Result<HashSet<String>, AppError>;

    async fn delete_job(&self, job_id: &str) -> Result<u64, AppError>;

    /// Qualifying users from `results` that have never been notified for
    /// this job, in input order.
    async fn find_newly_qualifying(
        &self,
        job_id: &str,
        results: &[QualificationRecord],
    ) -> Result<Vec<String>, AppError> {
        let notified = self.notified_user_ids(job_id).await?;
        Ok(results
            .iter()
            .filter(|r| r.qualifies && !notified.contains(&r.user_id))
            .map(|r| r.user_id.clone())
            .collect())
    }
}
