use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Ensures the three tables the service owns exist. The service is the sole
/// writer, so schema lives here rather than in an external migration tool.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS match_jobs (
            job_id      TEXT PRIMARY KEY,
            title       TEXT,
            is_active   BOOLEAN NOT NULL DEFAULT TRUE,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS match_qualifications (
            job_id          TEXT NOT NULL,
            user_id         TEXT NOT NULL,
            qualifies       BOOLEAN NOT NULL,
            final_score     DOUBLE PRECISION NOT NULL,
            domain_score    DOUBLE PRECISION,
            task_score      DOUBLE PRECISION,
            threshold_used  DOUBLE PRECISION NOT NULL,
            filter_reason   TEXT,
            notified_at     TIMESTAMPTZ,
            notified_via    TEXT,
            evaluated_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
            job_active      BOOLEAN NOT NULL DEFAULT TRUE,
            PRIMARY KEY (job_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_match_qualifications_pending
        ON match_qualifications (job_id)
        WHERE qualifies AND notified_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS match_audit (
            id          BIGSERIAL PRIMARY KEY,
            request_id  TEXT,
            event_type  TEXT NOT NULL,
            job_id      TEXT,
            user_id     TEXT,
            payload     JSONB,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Schema ensured");
    Ok(())
}
