//! Typed enqueue and claim operations over the durable job table.
//!
//! Webhook handlers and the reconciliation scheduler both push work
//! through here instead of touching orders directly, so every mutation
//! of ingested data happens inside a retryable job.

use brandpulse_core::{BrandId, ShopDomain};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::jobs::{self, NewJob};
use crate::db::RepositoryError;

pub use crate::db::jobs::{IngestJob, JobKind, JobSource, JobStatus};

/// Attempts a job gets before it is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Dedup key for a revenue recalculation job.
///
/// One pending or running recalculation per brand and date. The key is
/// cleared on completion, so order activity after the rollup lands can
/// schedule a fresh recalculation with the same key.
#[must_use]
pub fn revenue_job_key(brand_id: BrandId, date: NaiveDate) -> String {
    format!("calculate-revenue:{brand_id}:{date}")
}

/// Payload for a `calculate_revenue` job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RevenuePayload {
    /// Date to recompute, in the brand's timezone.
    pub date: NaiveDate,
}

/// Handle for enqueueing and claiming ingest jobs.
#[derive(Clone)]
pub struct JobQueue {
    pool: PgPool,
}

impl JobQueue {
    /// Create a queue handle over the shared pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue an `orders/create` payload for a shop.
    ///
    /// The brand is resolved at execution time, since several brands can
    /// share one shop domain. Replayed webhook deliveries re-enqueue, but
    /// the order upsert is idempotent so duplicates are harmless.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    #[instrument(skip(self, payload), fields(shop = %shop_domain))]
    pub async fn enqueue_order_created(
        &self,
        shop_domain: &ShopDomain,
        source: JobSource,
        payload: serde_json::Value,
    ) -> Result<Option<Uuid>, RepositoryError> {
        let id = jobs::insert_job(
            &self.pool,
            &NewJob {
                job_key: None,
                kind: JobKind::OrderCreated,
                source,
                brand_id: None,
                shop_domain: Some(shop_domain.clone()),
                payload,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
            },
        )
        .await?;

        debug!(job_id = ?id, "Enqueued order_created job");
        Ok(id)
    }

    /// Enqueue a `refunds/create` payload for a shop.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    #[instrument(skip(self, payload), fields(shop = %shop_domain))]
    pub async fn enqueue_refund_created(
        &self,
        shop_domain: &ShopDomain,
        source: JobSource,
        payload: serde_json::Value,
    ) -> Result<Option<Uuid>, RepositoryError> {
        let id = jobs::insert_job(
            &self.pool,
            &NewJob {
                job_key: None,
                kind: JobKind::RefundCreated,
                source,
                brand_id: None,
                shop_domain: Some(shop_domain.clone()),
                payload,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
            },
        )
        .await?;

        debug!(job_id = ?id, "Enqueued refund_created job");
        Ok(id)
    }

    /// Enqueue an order payload for one specific brand.
    ///
    /// Used by reconciliation, which already knows which brand it is
    /// repairing and must not fan out to other brands on the same shop.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    #[instrument(skip(self, payload), fields(brand_id = %brand_id))]
    pub async fn enqueue_order_for_brand(
        &self,
        brand_id: BrandId,
        payload: serde_json::Value,
    ) -> Result<Option<Uuid>, RepositoryError> {
        jobs::insert_job(
            &self.pool,
            &NewJob {
                job_key: None,
                kind: JobKind::OrderCreated,
                source: JobSource::Cron,
                brand_id: Some(brand_id),
                shop_domain: None,
                payload,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
            },
        )
        .await
    }

    /// Enqueue a refund payload for one specific brand.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    #[instrument(skip(self, payload), fields(brand_id = %brand_id))]
    pub async fn enqueue_refund_for_brand(
        &self,
        brand_id: BrandId,
        payload: serde_json::Value,
    ) -> Result<Option<Uuid>, RepositoryError> {
        jobs::insert_job(
            &self.pool,
            &NewJob {
                job_key: None,
                kind: JobKind::RefundCreated,
                source: JobSource::Cron,
                brand_id: Some(brand_id),
                shop_domain: None,
                payload,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
            },
        )
        .await
    }

    /// Enqueue a revenue recalculation for a brand and date.
    ///
    /// Deduplicated by [`revenue_job_key`]. Returns `None` when an
    /// equivalent job is already pending or running.
    ///
    /// # Errors
    ///
    /// Returns error if the insert or payload serialization fails.
    #[instrument(skip(self), fields(brand_id = %brand_id, date = %date))]
    pub async fn enqueue_revenue(
        &self,
        brand_id: BrandId,
        date: NaiveDate,
        source: JobSource,
    ) -> Result<Option<Uuid>, RepositoryError> {
        let payload = serde_json::to_value(RevenuePayload { date })
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        let id = jobs::insert_job(
            &self.pool,
            &NewJob {
                job_key: Some(revenue_job_key(brand_id, date)),
                kind: JobKind::CalculateRevenue,
                source,
                brand_id: Some(brand_id),
                shop_domain: None,
                payload,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
            },
        )
        .await?;

        if id.is_none() {
            debug!("Revenue job already queued, skipping");
        }
        Ok(id)
    }

    /// Claim the next runnable job for a worker.
    ///
    /// # Errors
    ///
    /// Returns error if the claim transaction fails.
    pub async fn claim(&self, worker: &str) -> Result<Option<IngestJob>, RepositoryError> {
        jobs::claim_next(&self.pool, worker).await
    }

    /// Mark a job completed.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn complete(&self, id: Uuid) -> Result<(), RepositoryError> {
        jobs::complete_job(&self.pool, id).await
    }

    /// Record a failed attempt, rescheduling or failing the job.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn fail(
        &self,
        id: Uuid,
        error: &str,
        backoff: std::time::Duration,
    ) -> Result<(), RepositoryError> {
        jobs::fail_job(&self.pool, id, error, backoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revenue_job_key_is_stable_per_brand_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let a = revenue_job_key(BrandId::new(7), date);
        let b = revenue_job_key(BrandId::new(7), date);
        assert_eq!(a, b);
        assert_eq!(a, "calculate-revenue:7:2026-03-14");
    }

    #[test]
    fn revenue_job_key_differs_across_brands_and_dates() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let next = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_ne!(
            revenue_job_key(BrandId::new(7), date),
            revenue_job_key(BrandId::new(8), date)
        );
        assert_ne!(
            revenue_job_key(BrandId::new(7), date),
            revenue_job_key(BrandId::new(7), next)
        );
    }
}
