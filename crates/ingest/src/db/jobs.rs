//! Durable ingest job queue backed by Postgres.
//!
//! Workers claim jobs with `FOR UPDATE SKIP LOCKED` so multiple workers can
//! poll the same table without stepping on each other. Completion clears the
//! `job_key` so a recurring deduplicated job (revenue recalculation) can be
//! enqueued again for the same brand and date later.

use brandpulse_core::{BrandId, ShopDomain};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

/// What a job does when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Upsert an order from a Shopify payload.
    OrderCreated,
    /// Apply a refund to a stored order.
    RefundCreated,
    /// Recompute daily revenue for a brand and date.
    CalculateRevenue,
    /// Record and act on a GDPR request.
    GdprRequest,
}

/// Where a job came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    /// Enqueued by a webhook delivery.
    Webhook,
    /// Enqueued by the reconciliation scheduler.
    Cron,
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker.
    Running,
    /// Finished successfully.
    Completed,
    /// Exhausted all attempts.
    Failed,
}

/// A row in the `ingest_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestJob {
    /// Job ID.
    pub id: Uuid,
    /// Dedup key, `NULL` once completed.
    pub job_key: Option<String>,
    /// What the job does.
    pub kind: JobKind,
    /// Where the job came from.
    pub source: JobSource,
    /// Brand the job targets, if known at enqueue time.
    pub brand_id: Option<BrandId>,
    /// Shop domain the job targets.
    pub shop_domain: Option<ShopDomain>,
    /// Kind-specific payload.
    pub payload: serde_json::Value,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Attempts so far, including the current one.
    pub attempts: i32,
    /// Attempts allowed before the job is marked failed.
    pub max_attempts: i32,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
    /// When the job was enqueued.
    pub received_at: DateTime<Utc>,
    /// Earliest time the job may run.
    pub scheduled_at: DateTime<Utc>,
    /// When the current attempt was claimed.
    pub locked_at: Option<DateTime<Utc>>,
    /// Worker that claimed the current attempt.
    pub locked_by: Option<String>,
    /// When the job completed.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Parameters for enqueueing a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Dedup key, or `None` for jobs that always enqueue.
    pub job_key: Option<String>,
    /// What the job does.
    pub kind: JobKind,
    /// Where the job came from.
    pub source: JobSource,
    /// Brand the job targets.
    pub brand_id: Option<BrandId>,
    /// Shop domain the job targets.
    pub shop_domain: Option<ShopDomain>,
    /// Kind-specific payload.
    pub payload: serde_json::Value,
    /// Attempts allowed.
    pub max_attempts: i32,
}

/// Enqueue a job. A duplicate `job_key` among non-completed jobs is a no-op.
///
/// Returns the job ID, or `None` if deduplication suppressed the insert.
///
/// # Errors
///
/// Returns error if the database insert fails.
pub async fn insert_job(pool: &PgPool, job: &NewJob) -> Result<Option<Uuid>, RepositoryError> {
    let id: Option<Uuid> = sqlx::query_scalar(
        r"
        INSERT INTO ingest_jobs (job_key, kind, source, brand_id, shop_domain, payload, max_attempts)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (job_key) WHERE job_key IS NOT NULL DO NOTHING
        RETURNING id
        ",
    )
    .bind(&job.job_key)
    .bind(job.kind)
    .bind(job.source)
    .bind(job.brand_id)
    .bind(&job.shop_domain)
    .bind(&job.payload)
    .bind(job.max_attempts)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Claim the next runnable job for a worker.
///
/// Claims the oldest pending job whose `scheduled_at` has passed, marking it
/// running and incrementing its attempt counter in the same transaction.
/// `SKIP LOCKED` lets concurrent workers claim disjoint jobs.
///
/// # Errors
///
/// Returns error if the database transaction fails.
pub async fn claim_next(pool: &PgPool, worker: &str) -> Result<Option<IngestJob>, RepositoryError> {
    let mut tx = pool.begin().await?;

    let job = sqlx::query_as::<_, IngestJob>(
        r"
        UPDATE ingest_jobs
        SET status = 'running',
            attempts = attempts + 1,
            locked_at = NOW(),
            locked_by = $1
        WHERE id = (
            SELECT id FROM ingest_jobs
            WHERE status = 'pending' AND scheduled_at <= NOW()
            ORDER BY scheduled_at
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING
            id, job_key, kind, source, brand_id, shop_domain, payload,
            status, attempts, max_attempts, last_error,
            received_at, scheduled_at, locked_at, locked_by, completed_at
        ",
    )
    .bind(worker)
    .fetch_optional(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(job)
}

/// Mark a job completed, clearing its dedup key.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn complete_job(pool: &PgPool, id: Uuid) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE ingest_jobs
        SET status = 'completed',
            job_key = NULL,
            completed_at = NOW(),
            locked_at = NULL,
            locked_by = NULL
        WHERE id = $1
        ",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a failed attempt.
///
/// Reschedules the job with a linear backoff while attempts remain, and
/// marks it failed once `max_attempts` is exhausted. The dedup key survives a
/// retry so duplicates stay suppressed, and survives terminal failure so the
/// failed row blocks re-enqueue until an operator intervenes.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn fail_job(
    pool: &PgPool,
    id: Uuid,
    error: &str,
    backoff: std::time::Duration,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE ingest_jobs
        SET status = CASE WHEN attempts >= max_attempts THEN 'failed'::job_status
                          ELSE 'pending'::job_status END,
            scheduled_at = NOW() + attempts * make_interval(secs => $2),
            last_error = $3,
            locked_at = NULL,
            locked_by = NULL
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(backoff.as_secs_f64())
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}
