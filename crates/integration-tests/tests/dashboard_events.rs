//! Integration tests for the dashboard event bus and its wire format.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use brandpulse_core::BrandId;
use brandpulse_ingest::events::{DashboardEvent, EventBus};

fn recalculated() -> DashboardEvent {
    DashboardEvent::RevenueRecalculated {
        brand_id: BrandId::new(4),
        date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        order_count: 31,
        net_revenue: Decimal::from_str("4820.00").unwrap(),
    }
}

// =============================================================================
// Delivery semantics
// =============================================================================

#[tokio::test]
async fn test_every_subscriber_sees_every_event() {
    let bus = EventBus::new();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.publish(recalculated());

    assert_eq!(a.recv().await.unwrap(), recalculated());
    assert_eq!(b.recv().await.unwrap(), recalculated());
}

#[tokio::test]
async fn test_events_are_not_persisted_for_late_subscribers() {
    let bus = EventBus::new();
    bus.publish(recalculated());

    let mut late = bus.subscribe();
    bus.publish(DashboardEvent::RevenueRecalcFailed {
        brand_id: BrandId::new(4),
        date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        error: "shopify timeout".to_string(),
    });

    let first_seen = late.recv().await.unwrap();
    assert!(matches!(
        first_seen,
        DashboardEvent::RevenueRecalcFailed { .. }
    ));
}

#[tokio::test]
async fn test_publishing_with_no_subscribers_is_fine() {
    let bus = EventBus::new();
    bus.publish(recalculated());
    assert_eq!(bus.subscriber_count(), 0);
}

// =============================================================================
// Wire format
// =============================================================================

#[test]
fn test_recalculated_event_json_shape() {
    let json = serde_json::to_value(recalculated()).unwrap();
    assert_eq!(json["type"], "revenue_recalculated");
    assert_eq!(json["brand_id"], 4);
    assert_eq!(json["date"], "2026-03-14");
    assert_eq!(json["order_count"], 31);
    // rust_decimal serializes as a string, so dashboards never see
    // float rounding.
    assert_eq!(json["net_revenue"], "4820.00");
}

#[test]
fn test_failure_event_json_shape() {
    let event = DashboardEvent::RevenueRecalcFailed {
        brand_id: BrandId::new(4),
        date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        error: "shopify timeout".to_string(),
    };
    let json = serde_json::to_value(event).unwrap();
    assert_eq!(json["type"], "revenue_recalc_failed");
    assert_eq!(json["error"], "shopify timeout");
}
