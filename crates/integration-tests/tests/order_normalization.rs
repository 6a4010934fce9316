//! Integration tests for order payload normalization.
//!
//! The same payload arrives via webhook and via reconciliation; both
//! paths must land identical rows or the nightly diff never converges.

use std::str::FromStr;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use brandpulse_core::{BrandId, FinancialStatus};
use brandpulse_integration_tests::{midday, paid_order, refund_for};
use brandpulse_ingest::shopify::types::{normalize_order, normalize_refund};

// =============================================================================
// Date bucketing
// =============================================================================

#[test]
fn test_order_date_follows_brand_timezone() {
    let mut payload = paid_order(1);
    // 23:30 UTC on March 14th
    payload.created_at = Utc.with_ymd_and_hms(2026, 3, 14, 23, 30, 0).unwrap();

    let utc = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap();
    assert_eq!(utc.order_date, NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());

    // Tokyo is already on the 15th
    let tokyo = normalize_order(&payload, BrandId::new(1), chrono_tz::Asia::Tokyo).unwrap();
    assert_eq!(tokyo.order_date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());

    // Los Angeles is still on the 14th
    let la = normalize_order(&payload, BrandId::new(1), chrono_tz::America::Los_Angeles).unwrap();
    assert_eq!(la.order_date, NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
}

#[test]
fn test_same_payload_same_row_for_same_brand() {
    let payload = paid_order(42);
    let a = normalize_order(&payload, BrandId::new(9), chrono_tz::Europe::Berlin).unwrap();
    let b = normalize_order(&payload, BrandId::new(9), chrono_tz::Europe::Berlin).unwrap();

    assert_eq!(a.shopify_order_id, b.shopify_order_id);
    assert_eq!(a.order_date, b.order_date);
    assert_eq!(a.total_amount, b.total_amount);
    assert_eq!(a.financial_status, b.financial_status);
    assert_eq!(a.cancelled, b.cancelled);
}

// =============================================================================
// Money parsing
// =============================================================================

#[test]
fn test_total_price_parses_exactly() {
    let mut payload = paid_order(1);
    payload.total_price = "10.10".to_string();

    let order = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap();
    assert_eq!(order.total_amount, Decimal::from_str("10.10").unwrap());
}

#[test]
fn test_refund_total_sums_all_refunds() {
    let mut payload = paid_order(1);
    payload.refunds = vec![
        refund_for(1, 100, &["5.00", "2.50"]),
        refund_for(1, 101, &["10.00"]),
    ];

    let order = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap();
    assert_eq!(order.refund_total(), Decimal::from_str("17.50").unwrap());
}

#[test]
fn test_refund_without_transactions_is_zero() {
    let refund = normalize_refund(&refund_for(1, 100, &[])).unwrap();
    assert_eq!(refund.amount, Decimal::ZERO);
}

#[test]
fn test_unparseable_money_is_an_error() {
    let mut payload = paid_order(1);
    payload.total_price = "USD 149.99".to_string();
    assert!(normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).is_err());
}

// =============================================================================
// Status mapping
// =============================================================================

#[test]
fn test_known_statuses_map_directly() {
    for (raw, expected) in [
        ("pending", FinancialStatus::Pending),
        ("authorized", FinancialStatus::Authorized),
        ("partially_paid", FinancialStatus::PartiallyPaid),
        ("paid", FinancialStatus::Paid),
        ("partially_refunded", FinancialStatus::PartiallyRefunded),
        ("refunded", FinancialStatus::Refunded),
        ("voided", FinancialStatus::Voided),
    ] {
        assert_eq!(FinancialStatus::from_shopify(raw), expected, "{raw}");
    }
}

#[test]
fn test_unknown_and_missing_statuses_default_to_pending() {
    let mut payload = paid_order(1);

    payload.financial_status = Some("express_approved".to_string());
    let order = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap();
    assert_eq!(order.financial_status, FinancialStatus::Pending);

    payload.financial_status = None;
    let order = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap();
    assert_eq!(order.financial_status, FinancialStatus::Pending);
}

#[test]
fn test_cancellation_and_creation_instants_are_preserved() {
    let mut payload = paid_order(7);
    payload.cancelled_at = Some(Utc.with_ymd_and_hms(2026, 3, 15, 8, 0, 0).unwrap());

    let order = normalize_order(&payload, BrandId::new(1), chrono_tz::UTC).unwrap();
    assert!(order.cancelled);
    assert_eq!(order.created_at_shopify, midday());
}
