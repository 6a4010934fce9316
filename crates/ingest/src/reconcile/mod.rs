//! Daily reconciliation against the Shopify Admin API.
//!
//! Webhooks are at-least-once but not guaranteed: deliveries get dropped
//! during deploys, outages, and app reinstalls. Once a day, per brand,
//! reconciliation pulls yesterday's orders straight from Shopify and
//! repairs the gaps by enqueueing the same jobs a webhook would have.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use brandpulse_core::ShopifyOrderId;
use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, instrument, warn};

use crate::db::brands::{self, Brand};
use crate::db::orders;
use crate::error::AppError;
use crate::queue::JobQueue;
use crate::shopify::types::OrderPayload;
use crate::shopify::ShopifyClient;

/// Brand-local hour at which reconciliation runs.
const RECONCILE_HOUR: u32 = 2;

/// Daily diff-and-repair service for all Shopify-connected brands.
pub struct ReconcileService {
    pool: PgPool,
    queue: JobQueue,
    shopify: ShopifyClient,
    /// Pause between brands, spreading Admin API load.
    brand_delay: Duration,
}

impl ReconcileService {
    /// Create the service over shared handles.
    #[must_use]
    pub fn new(
        pool: PgPool,
        queue: JobQueue,
        shopify: ShopifyClient,
        brand_delay: Duration,
    ) -> Self {
        Self {
            pool,
            queue,
            shopify,
            brand_delay,
        }
    }

    /// Run reconciliation for every brand that is due.
    ///
    /// With `catch_up` the local-hour gate is skipped, so brands whose
    /// run was missed while the service was down reconcile immediately
    /// on startup. One brand failing logs and moves on; a single broken
    /// token must not stall every other tenant.
    #[instrument(skip(self))]
    pub async fn run_due(&self, catch_up: bool) {
        let brands = match brands::list_shopify_brands(&self.pool).await {
            Ok(brands) => brands,
            Err(e) => {
                error!(error = %e, "Failed to list brands for reconciliation");
                return;
            }
        };

        for brand in brands {
            let tz = match brand.tz() {
                Ok(tz) => tz,
                Err(e) => {
                    error!(brand_id = %brand.id, error = %e, "Skipping brand");
                    continue;
                }
            };

            let now_local = Utc::now().with_timezone(&tz);
            let Some(target) = due_date(&brand, now_local.date_naive()) else {
                continue;
            };
            if !catch_up && now_local.hour() != RECONCILE_HOUR {
                continue;
            }

            if let Err(e) = self.reconcile_brand(&brand, tz, target).await {
                error!(
                    brand_id = %brand.id,
                    date = %target,
                    error = %e,
                    "Reconciliation failed for brand"
                );
            }

            tokio::time::sleep(self.brand_delay).await;
        }
    }

    /// Reconcile one brand for one brand-local date.
    ///
    /// # Errors
    ///
    /// Returns error if the Shopify fetch or any database step fails.
    #[instrument(skip(self, brand, tz), fields(brand_id = %brand.id, date = %date))]
    pub async fn reconcile_brand(
        &self,
        brand: &Brand,
        tz: Tz,
        date: NaiveDate,
    ) -> Result<(), AppError> {
        let (shop, token) = match (&brand.shop_domain, &brand.access_token) {
            (Some(shop), Some(token)) => (shop, token.as_str()),
            _ => return Err(AppError::Shopify(crate::shopify::ShopifyError::NotConnected(
                brand.id.as_i32(),
            ))),
        };

        let (start, end) = day_window(date, tz)?;
        let remote = self.shopify.fetch_orders(shop, token, start, end).await?;

        let local_ids = orders::order_ids_for_date(&self.pool, brand.id, date).await?;
        let local_refunds = orders::refund_ids_for_date(&self.pool, brand.id, date).await?;

        let absent = missing_orders(&remote, &local_ids);
        let repaired_orders = absent.len();
        let mut repaired_refunds = 0usize;

        for order in absent {
            let payload =
                serde_json::to_value(order).map_err(|e| AppError::Internal(e.to_string()))?;
            self.queue.enqueue_order_for_brand(brand.id, payload).await?;
        }

        // Refund gaps only matter for orders we already hold; a
        // re-enqueued order arrives with its refunds embedded.
        for order in &remote {
            if !local_ids.contains(&ShopifyOrderId::from(order.id)) {
                continue;
            }

            for refund in missing_refunds(order, &local_refunds) {
                // Nested refunds carry no order_id; inject it so the
                // refund job knows which order to apply to.
                let mut refund = refund.clone();
                refund.order_id = Some(order.id);
                let payload = serde_json::to_value(&refund)
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                self.queue.enqueue_refund_for_brand(brand.id, payload).await?;
                repaired_refunds += 1;
            }
        }

        if repaired_orders > 0 || repaired_refunds > 0 {
            warn!(
                brand_id = %brand.id,
                date = %date,
                missing_orders = repaired_orders,
                missing_refunds = repaired_refunds,
                "Reconciliation found gaps"
            );
        }

        self.queue
            .enqueue_revenue(brand.id, date, crate::queue::JobSource::Cron)
            .await?;
        brands::mark_reconciled(&self.pool, brand.id, date).await?;

        info!(
            brand_id = %brand.id,
            date = %date,
            remote_orders = remote.len(),
            "Brand reconciled"
        );
        Ok(())
    }
}

/// The date a brand still needs reconciled, if any.
///
/// Always local yesterday: reconciling today would race with orders
/// still coming in. A brand never reconciled before starts with
/// yesterday too rather than backfilling history.
fn due_date(brand: &Brand, local_today: NaiveDate) -> Option<NaiveDate> {
    let yesterday = local_today.pred_opt()?;
    match brand.last_reconciled_date {
        Some(done) if done >= yesterday => None,
        _ => Some(yesterday),
    }
}

/// UTC instants bounding a brand-local calendar date.
fn day_window(date: NaiveDate, tz: Tz) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let start_local = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::Internal(format!("invalid date {date}")))?;
    let end_local = start_local + chrono::Duration::days(1);

    // earliest() handles DST transitions where midnight is ambiguous
    // or skipped entirely.
    let start = tz
        .from_local_datetime(&start_local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(start_local + chrono::Duration::hours(1))).earliest())
        .ok_or_else(|| AppError::Internal(format!("unresolvable local midnight for {date}")))?;
    let end = tz
        .from_local_datetime(&end_local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(end_local + chrono::Duration::hours(1))).earliest())
        .ok_or_else(|| AppError::Internal(format!("unresolvable local midnight for {date}")))?;

    Ok((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}

/// Remote orders with no local row for the date.
fn missing_orders<'a>(
    remote: &'a [OrderPayload],
    local_ids: &HashSet<ShopifyOrderId>,
) -> Vec<&'a OrderPayload> {
    remote
        .iter()
        .filter(|order| !local_ids.contains(&ShopifyOrderId::from(order.id)))
        .collect()
}

/// Refunds on a remote order that the local copy does not have yet.
fn missing_refunds<'a>(
    remote: &'a OrderPayload,
    local_refunds: &HashMap<ShopifyOrderId, HashSet<i64>>,
) -> Vec<&'a crate::shopify::types::RefundPayload> {
    let known = local_refunds.get(&ShopifyOrderId::from(remote.id));
    remote
        .refunds
        .iter()
        .filter(|refund| !known.is_some_and(|ids| ids.contains(&refund.id)))
        .collect()
}

/// Start the hourly scheduler plus a one-shot startup catch-up pass.
///
/// # Errors
///
/// Returns error if the scheduler cannot be created or started.
pub async fn start_scheduler(service: Arc<ReconcileService>) -> Result<JobScheduler, AppError> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| AppError::Internal(format!("scheduler init failed: {e}")))?;

    let hourly = service.clone();
    scheduler
        .add(
            Job::new_async("0 0 * * * *", move |_uuid, _l| {
                let service = hourly.clone();
                Box::pin(async move {
                    service.run_due(false).await;
                })
            })
            .map_err(|e| AppError::Internal(format!("scheduler job failed: {e}")))?,
        )
        .await
        .map_err(|e| AppError::Internal(format!("scheduler add failed: {e}")))?;

    scheduler
        .start()
        .await
        .map_err(|e| AppError::Internal(format!("scheduler start failed: {e}")))?;
    info!("Reconciliation scheduler started (hourly tick)");

    // Catch-up for brands that missed their window while we were down.
    tokio::spawn(async move {
        service.run_due(true).await;
    });

    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use brandpulse_core::BrandId;
    use chrono::NaiveDate;

    use super::*;

    fn brand(last_reconciled: Option<NaiveDate>) -> Brand {
        Brand {
            id: BrandId::new(1),
            name: "Acme".to_string(),
            shop_domain: Some("acme.myshopify.com".parse().unwrap()),
            access_token: Some("shpat_token".to_string()),
            timezone: "America/New_York".to_string(),
            last_reconciled_date: last_reconciled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn never_reconciled_brand_is_due_for_yesterday() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(
            due_date(&brand(None), today),
            NaiveDate::from_ymd_opt(2026, 3, 14)
        );
    }

    #[test]
    fn reconciled_brand_is_not_due_again_same_day() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let done = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        assert_eq!(due_date(&brand(Some(done)), today), None);
    }

    #[test]
    fn stale_brand_is_due() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let done = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(
            due_date(&brand(Some(done)), today),
            NaiveDate::from_ymd_opt(2026, 3, 14)
        );
    }

    #[test]
    fn day_window_converts_local_midnights_to_utc() {
        // Winter: New York is UTC-5.
        let date = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let (start, end) = day_window(date, chrono_tz::America::New_York).unwrap();
        assert_eq!(start.to_rfc3339(), "2026-01-10T05:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-01-11T05:00:00+00:00");
    }

    #[test]
    fn day_window_spans_dst_transition() {
        // US spring-forward 2026-03-08: the local day is 23 hours long.
        let date = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let (start, end) = day_window(date, chrono_tz::America::New_York).unwrap();
        assert_eq!((end - start).num_hours(), 23);
    }

    fn remote_order(id: i64) -> OrderPayload {
        use chrono::TimeZone;

        OrderPayload {
            id,
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap(),
            currency: "USD".to_string(),
            total_price: "50.00".to_string(),
            financial_status: Some("paid".to_string()),
            cancelled_at: None,
            refunds: vec![],
        }
    }

    #[test]
    fn missing_orders_selects_remote_orders_absent_locally() {
        let remote = vec![remote_order(900), remote_order(901)];
        let local = HashSet::from([ShopifyOrderId::from(900)]);

        let missing = missing_orders(&remote, &local);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, 901);
    }

    #[test]
    fn missing_orders_is_empty_when_local_copy_is_complete() {
        let remote = vec![remote_order(900), remote_order(901)];
        let local = HashSet::from([ShopifyOrderId::from(900), ShopifyOrderId::from(901)]);

        assert!(missing_orders(&remote, &local).is_empty());
    }

    #[test]
    fn missing_refunds_spots_gaps() {
        use crate::shopify::types::{RefundPayload, RefundTransactionPayload};
        use chrono::TimeZone;

        let order = OrderPayload {
            id: 900,
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap(),
            currency: "USD".to_string(),
            total_price: "50.00".to_string(),
            financial_status: Some("paid".to_string()),
            cancelled_at: None,
            refunds: vec![
                RefundPayload {
                    id: 1,
                    order_id: None,
                    created_at: Utc.with_ymd_and_hms(2026, 3, 14, 11, 0, 0).unwrap(),
                    transactions: vec![RefundTransactionPayload {
                        amount: "5.00".to_string(),
                    }],
                },
                RefundPayload {
                    id: 2,
                    order_id: None,
                    created_at: Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap(),
                    transactions: vec![],
                },
            ],
        };

        let mut local = HashMap::new();
        local.insert(ShopifyOrderId::from(900), HashSet::from([1i64]));

        let missing = missing_refunds(&order, &local);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, 2);

        // Order entirely unknown locally: every refund is missing, though
        // the caller enqueues the whole order instead in that case.
        let missing = missing_refunds(&order, &HashMap::new());
        assert_eq!(missing.len(), 2);
    }
}
