//! Execution of `calculate_revenue` jobs.
//!
//! The rollup is always recomputed from stored orders rather than nudged
//! incrementally, so replays and out-of-order jobs converge on the same
//! numbers.

use tracing::{info, instrument};

use crate::db::{metrics, orders};
use crate::error::AppError;
use crate::events::DashboardEvent;
use crate::queue::{IngestJob, RevenuePayload};

use super::WorkerContext;

/// Recompute the daily rollup for the job's brand and date, then notify
/// dashboards.
#[instrument(skip(ctx, job), fields(job_id = %job.id))]
pub async fn handle_calculate_revenue(
    ctx: &WorkerContext,
    job: &IngestJob,
) -> Result<(), AppError> {
    let brand_id = job
        .brand_id
        .ok_or_else(|| AppError::Internal(format!("revenue job {} missing brand_id", job.id)))?;
    let payload: RevenuePayload = serde_json::from_value(job.payload.clone())
        .map_err(|e| AppError::BadRequest(format!("invalid revenue payload: {e}")))?;

    let aggregate = orders::aggregate_for_date(&ctx.pool, brand_id, payload.date).await?;
    metrics::upsert_metrics(&ctx.pool, brand_id, payload.date, &aggregate).await?;

    info!(
        brand_id = %brand_id,
        date = %payload.date,
        order_count = aggregate.order_count,
        net_revenue = %aggregate.net_revenue(),
        "Daily revenue recalculated"
    );

    ctx.events.publish(DashboardEvent::RevenueRecalculated {
        brand_id,
        date: payload.date,
        order_count: aggregate.order_count,
        net_revenue: aggregate.net_revenue(),
    });

    Ok(())
}
