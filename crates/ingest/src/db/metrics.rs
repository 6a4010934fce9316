//! Database operations for the `daily_metrics` rollup table.

use brandpulse_core::BrandId;
use chrono::NaiveDate;
use sqlx::PgPool;

use super::RepositoryError;
use super::orders::DailyAggregate;

/// Insert or overwrite the rollup for a brand and date.
///
/// Metrics are always recomputed from stored orders rather than adjusted
/// incrementally, so the upsert replaces every column.
///
/// # Errors
///
/// Returns error if the database upsert fails.
pub async fn upsert_metrics(
    pool: &PgPool,
    brand_id: BrandId,
    date: NaiveDate,
    aggregate: &DailyAggregate,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO daily_metrics (
            brand_id, metric_date, order_count, gross_revenue, refund_total, net_revenue,
            recalculated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (brand_id, metric_date) DO UPDATE SET
            order_count = EXCLUDED.order_count,
            gross_revenue = EXCLUDED.gross_revenue,
            refund_total = EXCLUDED.refund_total,
            net_revenue = EXCLUDED.net_revenue,
            recalculated_at = NOW()
        ",
    )
    .bind(brand_id)
    .bind(date)
    .bind(aggregate.order_count)
    .bind(aggregate.gross_revenue)
    .bind(aggregate.refund_total)
    .bind(aggregate.net_revenue())
    .execute(pool)
    .await?;

    Ok(())
}
