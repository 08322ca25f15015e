//! PostgreSQL qualification store.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use crate::errors::AppError;
use crate::models::qualification::{JobRow, QualificationRecord, QualificationRow};
use crate::qualifications::{
    QualificationStore, StoreResultsOptions, StoreResultsOutcome,
};

pub struct PgQualificationStore {
    pool: PgPool,
}

impl PgQualificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QualificationStore for PgQualificationStore {
    async fn ensure_job(
        &self,
        job_id: &str,
        title: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO match_jobs (job_id, title, is_active)
            VALUES ($1, $2, COALESCE($3, TRUE))
            ON CONFLICT (job_id) DO UPDATE SET
                title = COALESCE(EXCLUDED.title, match_jobs.title),
                is_active = COALESCE($3, match_jobs.is_active),
                updated_at = now()
            "#,
        )
        .bind(job_id)
        .bind(title)
        .bind(is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn job(&self, job_id: &str) -> Result<Option<JobRow>, AppError> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM match_jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn set_active(&self, job_id: &str, active: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE match_jobs SET is_active = $2, updated_at = now() WHERE job_id = $1")
            .bind(job_id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE match_qualifications SET job_active = $2 WHERE job_id = $1")
            .bind(job_id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_results(
        &self,
        job_id: &str,
        results: &[QualificationRecord],
        opts: StoreResultsOptions<'_>,
    ) -> Result<StoreResultsOutcome, AppError> {
        self.ensure_job(job_id, opts.job_title, None).await?;

        let mark: HashSet<&str> = opts.mark_notified.iter().map(String::as_str).collect();
        let mut outcome = StoreResultsOutcome::default();

        for record in results {
            let notify_now = mark.contains(record.user_id.as_str());
            let result = sqlx::query(
                r#"
                INSERT INTO match_qualifications
                    (job_id, user_id, qualifies, final_score, domain_score, task_score,
                     threshold_used, filter_reason, notified_at, notified_via,
                     evaluated_at, job_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                        CASE WHEN $9 THEN now() END,
                        CASE WHEN $9 THEN $10 END,
                        now(),
                        COALESCE((SELECT is_active FROM match_jobs WHERE job_id = $1), TRUE))
                ON CONFLICT (job_id, user_id) DO UPDATE SET
                    qualifies = EXCLUDED.qualifies,
                    final_score = EXCLUDED.final_score,
                    domain_score = EXCLUDED.domain_score,
                    task_score = EXCLUDED.task_score,
                    threshold_used = EXCLUDED.threshold_used,
                    filter_reason = EXCLUDED.filter_reason,
                    notified_at = COALESCE(match_qualifications.notified_at, EXCLUDED.notified_at),
                    notified_via = COALESCE(match_qualifications.notified_via, EXCLUDED.notified_via),
                    evaluated_at = EXCLUDED.evaluated_at,
                    job_active = EXCLUDED.job_active
                "#,
            )
            .bind(job_id)
            .bind(&record.user_id)
            .bind(record.qualifies)
            .bind(record.final_score)
            .bind(record.domain_score)
            .bind(record.task_score)
            .bind(record.threshold_used)
            .bind(&record.filter_reason)
            .bind(notify_now)
            .bind(opts.notified_via)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => outcome.stored += 1,
                Err(e) => {
                    warn!(
                        job_id = %job_id,
                        user_id = %record.user_id,
                        "failed to store qualification row: {e}"
                    );
                    outcome.failed += 1;
                }
            }
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
        let rows = sqlx::query_as::<_, QualificationRow>(
            r#"
            SELECT * FROM match_qualifications
            WHERE job_id = $1 AND ($2 = FALSE OR qualifies)
            ORDER BY final_score DESC, user_id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(job_id)
        .bind(qualifies_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn pending(&self, job_id: &str) -> Result<Vec<QualificationRow>, AppError> {
        let rows = sqlx::query_as::<_, QualificationRow>(
            r#"
            SELECT * FROM match_qualifications
            WHERE job_id = $1 AND qualifies AND notified_at IS NULL AND job_active
            ORDER BY final_score DESC, user_id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_notified(
        &self,
        job_id: &str,
        user_ids: &[String],
        notified_via: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE match_qualifications
            SET notified_at = COALESCE(notified_at, now()),
                notified_via = COALESCE(notified_via, $3)
            WHERE job_id = $1 AND user_id = ANY($2)
            "#,
        )
        .bind(job_id)
        .bind(user_ids)
        .bind(notified_via)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn notified_user_ids(&self, job_id: &str) -> Result<HashSet<String>, AppError> {
        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT user_id FROM match_qualifications WHERE job_id = $1 AND notified_at IS NOT NULL",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn delete_job(&self, job_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM match_qualifications WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM match_jobs WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
