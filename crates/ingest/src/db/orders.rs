//! Database operations for ingested Shopify orders.
//!
//! Orders are upserted keyed by `(brand_id, shopify_order_id)` so replaying
//! the same webhook or reconciliation job overwrites rather than duplicates.

use std::collections::{HashMap, HashSet};

use brandpulse_core::{BrandId, FinancialStatus, ShopifyOrderId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::RepositoryError;

/// A stored refund, kept inside the order row as JSONB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRefund {
    /// Shopify refund ID.
    pub id: i64,
    /// When Shopify created the refund.
    pub created_at: DateTime<Utc>,
    /// Refunded amount.
    pub amount: Decimal,
}

/// An ingested Shopify order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRecord {
    /// Brand the order belongs to.
    pub brand_id: BrandId,
    /// Shopify order ID.
    pub shopify_order_id: ShopifyOrderId,
    /// Order date in the brand's timezone.
    pub order_date: NaiveDate,
    /// When Shopify created the order.
    pub created_at_shopify: DateTime<Utc>,
    /// ISO currency code.
    pub currency: String,
    /// Order total.
    pub total_amount: Decimal,
    /// Shopify financial status.
    pub financial_status: FinancialStatus,
    /// Whether the order was cancelled.
    pub cancelled: bool,
    /// Refunds applied to the order (JSONB array of [`StoredRefund`]).
    pub refunds: serde_json::Value,
    /// Sum of refund amounts.
    pub refund_total: Decimal,
}

/// Parameters for upserting an order.
#[derive(Debug, Clone)]
pub struct UpsertOrder {
    /// Brand the order belongs to.
    pub brand_id: BrandId,
    /// Shopify order ID.
    pub shopify_order_id: ShopifyOrderId,
    /// Order date in the brand's timezone.
    pub order_date: NaiveDate,
    /// When Shopify created the order.
    pub created_at_shopify: DateTime<Utc>,
    /// ISO currency code.
    pub currency: String,
    /// Order total.
    pub total_amount: Decimal,
    /// Shopify financial status.
    pub financial_status: FinancialStatus,
    /// Whether the order was cancelled.
    pub cancelled: bool,
    /// Refunds applied to the order.
    pub refunds: Vec<StoredRefund>,
}

impl UpsertOrder {
    /// Sum of refund amounts.
    #[must_use]
    pub fn refund_total(&self) -> Decimal {
        self.refunds.iter().map(|r| r.amount).sum()
    }
}

/// Insert or overwrite an order keyed by `(brand_id, shopify_order_id)`.
///
/// # Errors
///
/// Returns error if the database upsert fails.
pub async fn upsert_order(pool: &PgPool, order: &UpsertOrder) -> Result<(), RepositoryError> {
    let refunds = serde_json::to_value(&order.refunds)
        .map_err(|e| RepositoryError::DataCorruption(format!("refunds not serializable: {e}")))?;

    sqlx::query(
        r"
        INSERT INTO shopify_orders (
            brand_id, shopify_order_id, order_date, created_at_shopify,
            currency, total_amount, financial_status, cancelled,
            refunds, refund_total
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (brand_id, shopify_order_id) DO UPDATE SET
            order_date = EXCLUDED.order_date,
            created_at_shopify = EXCLUDED.created_at_shopify,
            currency = EXCLUDED.currency,
            total_amount = EXCLUDED.total_amount,
            financial_status = EXCLUDED.financial_status,
            cancelled = EXCLUDED.cancelled,
            refunds = EXCLUDED.refunds,
            refund_total = EXCLUDED.refund_total,
            updated_at = NOW()
        ",
    )
    .bind(order.brand_id)
    .bind(order.shopify_order_id)
    .bind(order.order_date)
    .bind(order.created_at_shopify)
    .bind(&order.currency)
    .bind(order.total_amount)
    .bind(order.financial_status)
    .bind(order.cancelled)
    .bind(refunds)
    .bind(order.refund_total())
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a single order.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn get_order(
    pool: &PgPool,
    brand_id: BrandId,
    shopify_order_id: ShopifyOrderId,
) -> Result<Option<OrderRecord>, RepositoryError> {
    let order = sqlx::query_as::<_, OrderRecord>(
        r"
        SELECT
            brand_id, shopify_order_id, order_date, created_at_shopify,
            currency, total_amount, financial_status, cancelled,
            refunds, refund_total
        FROM shopify_orders
        WHERE brand_id = $1 AND shopify_order_id = $2
        ",
    )
    .bind(brand_id)
    .bind(shopify_order_id)
    .fetch_optional(pool)
    .await?;

    Ok(order)
}

/// Order ids stored locally for a brand and date.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn order_ids_for_date(
    pool: &PgPool,
    brand_id: BrandId,
    date: NaiveDate,
) -> Result<HashSet<ShopifyOrderId>, RepositoryError> {
    let ids: Vec<ShopifyOrderId> = sqlx::query_scalar(
        "SELECT shopify_order_id FROM shopify_orders WHERE brand_id = $1 AND order_date = $2",
    )
    .bind(brand_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(ids.into_iter().collect())
}

/// Refund ids stored locally per order, for a brand and date.
///
/// Used by reconciliation to spot remote refunds not yet reflected locally.
///
/// # Errors
///
/// Returns error if the database query fails or refund JSON is corrupted.
pub async fn refund_ids_for_date(
    pool: &PgPool,
    brand_id: BrandId,
    date: NaiveDate,
) -> Result<HashMap<ShopifyOrderId, HashSet<i64>>, RepositoryError> {
    let rows: Vec<(ShopifyOrderId, serde_json::Value)> = sqlx::query_as(
        "SELECT shopify_order_id, refunds FROM shopify_orders \
         WHERE brand_id = $1 AND order_date = $2",
    )
    .bind(brand_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    let mut map = HashMap::with_capacity(rows.len());
    for (order_id, refunds) in rows {
        let stored: Vec<StoredRefund> = serde_json::from_value(refunds).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid refunds for order {order_id}: {e}"))
        })?;
        map.insert(order_id, stored.into_iter().map(|r| r.id).collect());
    }

    Ok(map)
}

/// Append a refund to an order, recomputing the refund total.
///
/// Idempotent: a refund id already present is overwritten in place, so
/// replaying the same `refund_created` job cannot double-count.
///
/// # Errors
///
/// Returns `NotFound` if the order does not exist, or error if the update fails.
pub async fn apply_refund(
    pool: &PgPool,
    brand_id: BrandId,
    shopify_order_id: ShopifyOrderId,
    refund: &StoredRefund,
) -> Result<(), RepositoryError> {
    let mut tx = pool.begin().await?;

    let row: Option<(serde_json::Value,)> = sqlx::query_as(
        "SELECT refunds FROM shopify_orders \
         WHERE brand_id = $1 AND shopify_order_id = $2 FOR UPDATE",
    )
    .bind(brand_id)
    .bind(shopify_order_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((refunds,)) = row else {
        tx.rollback().await?;
        return Err(RepositoryError::NotFound);
    };

    let mut stored: Vec<StoredRefund> = serde_json::from_value(refunds).map_err(|e| {
        RepositoryError::DataCorruption(format!(
            "invalid refunds for order {shopify_order_id}: {e}"
        ))
    })?;

    match stored.iter_mut().find(|r| r.id == refund.id) {
        Some(existing) => *existing = refund.clone(),
        None => stored.push(refund.clone()),
    }
    let refund_total: Decimal = stored.iter().map(|r| r.amount).sum();

    let refunds = serde_json::to_value(&stored)
        .map_err(|e| RepositoryError::DataCorruption(format!("refunds not serializable: {e}")))?;

    sqlx::query(
        r"
        UPDATE shopify_orders
        SET refunds = $3, refund_total = $4, updated_at = NOW()
        WHERE brand_id = $1 AND shopify_order_id = $2
        ",
    )
    .bind(brand_id)
    .bind(shopify_order_id)
    .bind(refunds)
    .bind(refund_total)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Revenue aggregate for a brand and date.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DailyAggregate {
    /// Number of non-cancelled orders.
    pub order_count: i64,
    /// Sum of order totals.
    pub gross_revenue: Decimal,
    /// Sum of refund amounts.
    pub refund_total: Decimal,
}

impl DailyAggregate {
    /// Gross revenue minus refunds.
    #[must_use]
    pub fn net_revenue(&self) -> Decimal {
        self.gross_revenue - self.refund_total
    }
}

/// Aggregate stored orders for a brand and date, excluding cancelled orders.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn aggregate_for_date(
    pool: &PgPool,
    brand_id: BrandId,
    date: NaiveDate,
) -> Result<DailyAggregate, RepositoryError> {
    let aggregate = sqlx::query_as::<_, DailyAggregate>(
        r"
        SELECT
            COUNT(*) AS order_count,
            COALESCE(SUM(total_amount), 0) AS gross_revenue,
            COALESCE(SUM(refund_total), 0) AS refund_total
        FROM shopify_orders
        WHERE brand_id = $1 AND order_date = $2 AND cancelled = FALSE
        ",
    )
    .bind(brand_id)
    .bind(date)
    .fetch_one(pool)
    .await?;

    Ok(aggregate)
}
