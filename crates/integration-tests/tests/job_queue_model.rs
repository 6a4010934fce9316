//! Integration tests for the job queue model.
//!
//! The queue's correctness hangs on two invariants: the revenue dedup
//! key is deterministic, and the enum wire names match the Postgres
//! types the migrations create.

use chrono::NaiveDate;

use brandpulse_core::BrandId;
use brandpulse_ingest::queue::{
    DEFAULT_MAX_ATTEMPTS, JobKind, JobSource, JobStatus, RevenuePayload, revenue_job_key,
};

// =============================================================================
// Dedup key
// =============================================================================

#[test]
fn test_revenue_job_key_shape() {
    let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
    assert_eq!(
        revenue_job_key(BrandId::new(12), date),
        "calculate-revenue:12:2026-03-14"
    );
}

#[test]
fn test_revenue_job_key_is_deterministic() {
    let date = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
    assert_eq!(
        revenue_job_key(BrandId::new(3), date),
        revenue_job_key(BrandId::new(3), date)
    );
}

#[test]
fn test_revenue_job_key_distinguishes_brand_and_date() {
    let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
    let other_date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();

    let keys = [
        revenue_job_key(BrandId::new(1), date),
        revenue_job_key(BrandId::new(2), date),
        revenue_job_key(BrandId::new(1), other_date),
    ];
    assert_ne!(keys[0], keys[1]);
    assert_ne!(keys[0], keys[2]);
    assert_ne!(keys[1], keys[2]);
}

// =============================================================================
// Wire names
// =============================================================================

#[test]
fn test_job_kind_serializes_snake_case() {
    assert_eq!(
        serde_json::to_value(JobKind::OrderCreated).unwrap(),
        "order_created"
    );
    assert_eq!(
        serde_json::to_value(JobKind::RefundCreated).unwrap(),
        "refund_created"
    );
    assert_eq!(
        serde_json::to_value(JobKind::CalculateRevenue).unwrap(),
        "calculate_revenue"
    );
}

#[test]
fn test_job_source_serializes_snake_case() {
    assert_eq!(serde_json::to_value(JobSource::Webhook).unwrap(), "webhook");
    assert_eq!(serde_json::to_value(JobSource::Cron).unwrap(), "cron");
}

#[test]
fn test_job_status_round_trips() {
    for status in [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
    ] {
        let json = serde_json::to_value(status).unwrap();
        let back: JobStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);
    }
}

// =============================================================================
// Payloads
// =============================================================================

#[test]
fn test_revenue_payload_round_trips() {
    let payload = RevenuePayload {
        date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
    };
    let json = serde_json::to_value(payload).unwrap();
    assert_eq!(json["date"], "2026-03-14");

    let back: RevenuePayload = serde_json::from_value(json).unwrap();
    assert_eq!(back.date, payload.date);
}

#[test]
fn test_default_attempts_allow_retries() {
    assert!(DEFAULT_MAX_ATTEMPTS > 1);
}
