//! Shopify order and refund payloads, and normalization into stored rows.
//!
//! Webhook deliveries and Admin API responses share the same order shape,
//! so one set of payload types feeds both ingestion paths. Monetary values
//! arrive as strings and are parsed into [`Decimal`] exactly.

use std::str::FromStr;

use brandpulse_core::{BrandId, FinancialStatus};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ShopifyError;
use crate::db::orders::{StoredRefund, UpsertOrder};

/// An order as Shopify sends it, via webhook or the Admin API.
///
/// Also serializable: reconciliation re-enqueues orders it finds missing
/// as if they had arrived over a webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPayload {
    /// Shopify order ID.
    pub id: i64,
    /// When Shopify created the order.
    pub created_at: DateTime<Utc>,
    /// ISO currency code.
    pub currency: String,
    /// Order total as a decimal string.
    pub total_price: String,
    /// Shopify financial status, absent on some draft orders.
    #[serde(default)]
    pub financial_status: Option<String>,
    /// Set when the order was cancelled.
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Refunds applied so far.
    #[serde(default)]
    pub refunds: Vec<RefundPayload>,
}

/// A refund as Shopify sends it, nested in an order or as a
/// `refunds/create` webhook delivery.
///
/// Also serializable: reconciliation re-enqueues refunds it finds
/// missing as if they had arrived over a webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundPayload {
    /// Shopify refund ID.
    pub id: i64,
    /// Order the refund belongs to. Present on webhook deliveries,
    /// absent when nested inside an order payload.
    #[serde(default)]
    pub order_id: Option<i64>,
    /// When Shopify created the refund.
    pub created_at: DateTime<Utc>,
    /// Money movements making up the refund.
    #[serde(default)]
    pub transactions: Vec<RefundTransactionPayload>,
}

/// One money movement inside a refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundTransactionPayload {
    /// Refunded amount as a decimal string.
    pub amount: String,
}

fn parse_money(raw: &str, context: &str) -> Result<Decimal, ShopifyError> {
    Decimal::from_str(raw)
        .map_err(|e| ShopifyError::InvalidPayload(format!("{context}: bad amount {raw:?}: {e}")))
}

/// Normalize a Shopify order payload into an upsertable row.
///
/// The order date is the creation instant converted to the brand's
/// timezone, which is the date all daily rollups key on. Unknown or
/// missing financial statuses map to `pending` rather than failing the
/// job, since Shopify adds statuses without notice.
///
/// # Errors
///
/// Returns `InvalidPayload` if a monetary string does not parse.
pub fn normalize_order(
    payload: &OrderPayload,
    brand_id: BrandId,
    tz: Tz,
) -> Result<UpsertOrder, ShopifyError> {
    let total_amount = parse_money(&payload.total_price, "order total_price")?;

    let refunds = payload
        .refunds
        .iter()
        .map(normalize_refund)
        .collect::<Result<Vec<_>, _>>()?;

    let financial_status = payload
        .financial_status
        .as_deref()
        .map_or(FinancialStatus::Pending, FinancialStatus::from_shopify);

    Ok(UpsertOrder {
        brand_id,
        shopify_order_id: payload.id.into(),
        order_date: payload.created_at.with_timezone(&tz).date_naive(),
        created_at_shopify: payload.created_at,
        currency: payload.currency.clone(),
        total_amount,
        financial_status,
        cancelled: payload.cancelled_at.is_some(),
        refunds,
    })
}

/// Normalize a Shopify refund payload into a stored refund.
///
/// The refund amount is the sum of its transaction amounts, which is how
/// partial refunds are represented.
///
/// # Errors
///
/// Returns `InvalidPayload` if a transaction amount does not parse.
pub fn normalize_refund(payload: &RefundPayload) -> Result<StoredRefund, ShopifyError> {
    let mut amount = Decimal::ZERO;
    for tx in &payload.transactions {
        amount += parse_money(&tx.amount, "refund transaction")?;
    }

    Ok(StoredRefund {
        id: payload.id,
        created_at: payload.created_at,
        amount,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn order_payload(created_at: DateTime<Utc>) -> OrderPayload {
        OrderPayload {
            id: 5_001_234,
            created_at,
            currency: "USD".to_string(),
            total_price: "149.99".to_string(),
            financial_status: Some("paid".to_string()),
            cancelled_at: None,
            refunds: vec![],
        }
    }

    #[test]
    fn order_date_uses_brand_timezone() {
        // 01:30 UTC on the 15th is still the 14th in New York.
        let created = Utc.with_ymd_and_hms(2026, 3, 15, 1, 30, 0).unwrap();
        let payload = order_payload(created);

        let order =
            normalize_order(&payload, BrandId::new(1), chrono_tz::America::New_York).unwrap();
        assert_eq!(
            order.order_date,
            chrono::NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
        );

        let order = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap();
        assert_eq!(
            order.order_date,
            chrono::NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        );
    }

    #[test]
    fn unknown_financial_status_maps_to_pending() {
        let created = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let mut payload = order_payload(created);
        payload.financial_status = Some("some_future_status".to_string());

        let order = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap();
        assert_eq!(order.financial_status, FinancialStatus::Pending);

        payload.financial_status = None;
        let order = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap();
        assert_eq!(order.financial_status, FinancialStatus::Pending);
    }

    #[test]
    fn cancelled_at_marks_order_cancelled() {
        let created = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let mut payload = order_payload(created);
        payload.cancelled_at = Some(Utc.with_ymd_and_hms(2026, 3, 16, 9, 0, 0).unwrap());

        let order = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap();
        assert!(order.cancelled);
    }

    #[test]
    fn refund_amount_sums_transactions() {
        let payload = RefundPayload {
            id: 88,
            order_id: Some(5_001_234),
            created_at: Utc.with_ymd_and_hms(2026, 3, 16, 8, 0, 0).unwrap(),
            transactions: vec![
                RefundTransactionPayload {
                    amount: "10.00".to_string(),
                },
                RefundTransactionPayload {
                    amount: "4.50".to_string(),
                },
            ],
        };

        let refund = normalize_refund(&payload).unwrap();
        assert_eq!(refund.amount, Decimal::from_str("14.50").unwrap());
    }

    #[test]
    fn bad_money_string_is_rejected() {
        let created = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let mut payload = order_payload(created);
        payload.total_price = "not-a-number".to_string();

        let err = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap_err();
        assert!(matches!(err, ShopifyError::InvalidPayload(_)));
    }

    #[test]
    fn normalization_is_deterministic() {
        let created = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let payload = order_payload(created);

        let a = normalize_order(&payload, BrandId::new(7), chrono_tz::Europe::Berlin).unwrap();
        let b = normalize_order(&payload, BrandId::new(7), chrono_tz::Europe::Berlin).unwrap();
        assert_eq!(a.shopify_order_id, b.shopify_order_id);
        assert_eq!(a.order_date, b.order_date);
        assert_eq!(a.total_amount, b.total_amount);
        assert_eq!(a.refund_total(), b.refund_total());
    }
}
