//! Execution of `order_created` and `refund_created` jobs.
//!
//! Both handlers resolve the target brands at execution time. A single
//! shop domain can back several brand workspaces, and each brand gets
//! its own copy of the order keyed by its own timezone.

use tracing::{info, instrument, warn};

use crate::db::brands::{self, Brand};
use crate::db::orders;
use crate::error::AppError;
use crate::queue::IngestJob;
use crate::shopify::types::{OrderPayload, RefundPayload, normalize_order, normalize_refund};

use super::WorkerContext;

/// Brands a job targets: the explicit brand if set, otherwise every
/// brand connected to the job's shop domain.
async fn resolve_brands(ctx: &WorkerContext, job: &IngestJob) -> Result<Vec<Brand>, AppError> {
    if let Some(brand_id) = job.brand_id {
        let brand = brands::get_brand(&ctx.pool, brand_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("brand {brand_id}")))?;
        return Ok(vec![brand]);
    }

    let Some(shop_domain) = &job.shop_domain else {
        return Err(AppError::Internal(format!(
            "job {} has neither brand_id nor shop_domain",
            job.id
        )));
    };

    let matched = brands::get_brands_by_shop_domain(&ctx.pool, shop_domain).await?;
    if matched.is_empty() {
        // Webhooks can arrive before onboarding finishes or after a brand
        // disconnects. Nothing to do, and retrying will not change that.
        warn!(shop = %shop_domain, "No brands for shop, dropping job");
    }
    Ok(matched)
}

/// Upsert the order for every matching brand, then schedule revenue
/// recalculation for the order's brand-local date.
#[instrument(skip(ctx, job), fields(job_id = %job.id))]
pub async fn handle_order_created(ctx: &WorkerContext, job: &IngestJob) -> Result<(), AppError> {
    let payload: OrderPayload = serde_json::from_value(job.payload.clone())
        .map_err(|e| AppError::BadRequest(format!("invalid order payload: {e}")))?;

    for brand in resolve_brands(ctx, job).await? {
        let order = normalize_order(&payload, brand.id, brand.tz()?)?;
        let order_date = order.order_date;
        orders::upsert_order(&ctx.pool, &order).await?;

        info!(
            brand_id = %brand.id,
            shopify_order_id = payload.id,
            date = %order_date,
            "Order upserted"
        );

        ctx.queue
            .enqueue_revenue(brand.id, order_date, job.source)
            .await?;
    }

    Ok(())
}

/// Apply the refund for every matching brand, then schedule revenue
/// recalculation for the refunded order's date.
///
/// A refund for an order we have not stored yet fails the attempt so the
/// retry backoff gives the order's own job, or the nightly reconciliation,
/// time to land it first.
#[instrument(skip(ctx, job), fields(job_id = %job.id))]
pub async fn handle_refund_created(ctx: &WorkerContext, job: &IngestJob) -> Result<(), AppError> {
    let payload: RefundPayload = serde_json::from_value(job.payload.clone())
        .map_err(|e| AppError::BadRequest(format!("invalid refund payload: {e}")))?;

    let order_id = payload
        .order_id
        .ok_or_else(|| AppError::BadRequest("refund payload missing order_id".to_string()))?
        .into();

    let refund = normalize_refund(&payload)?;

    for brand in resolve_brands(ctx, job).await? {
        orders::apply_refund(&ctx.pool, brand.id, order_id, &refund).await?;

        let order = orders::get_order(&ctx.pool, brand.id, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

        info!(
            brand_id = %brand.id,
            shopify_order_id = %order_id,
            refund_id = payload.id,
            "Refund applied"
        );

        ctx.queue
            .enqueue_revenue(brand.id, order.order_date, job.source)
            .await?;
    }

    Ok(())
}
