//! In-process notification bus for dashboard updates.
//!
//! Revenue recalculations publish here, and the SSE endpoint fans events
//! out to connected dashboard sessions. Events are fire-and-forget: a
//! slow subscriber is lagged past, never blocked on, and nothing is
//! persisted.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use brandpulse_core::BrandId;
use chrono::NaiveDate;
use futures::Stream;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::state::AppState;

/// Buffered events per subscriber before lagging kicks in.
const CHANNEL_CAPACITY: usize = 256;

/// An event published for dashboard consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// A daily rollup was recomputed.
    RevenueRecalculated {
        /// Brand the rollup belongs to.
        brand_id: BrandId,
        /// Date the rollup covers.
        date: NaiveDate,
        /// Number of non-cancelled orders.
        order_count: i64,
        /// Gross revenue minus refunds.
        net_revenue: Decimal,
    },
    /// A revenue recalculation exhausted its attempts.
    RevenueRecalcFailed {
        /// Brand whose rollup failed.
        brand_id: BrandId,
        /// Date that failed to recompute.
        date: NaiveDate,
        /// Error from the final attempt.
        error: String,
    },
}

/// Broadcast channel for [`DashboardEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashboardEvent>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// A bus with no subscribers drops the event silently.
    pub fn publish(&self, event: DashboardEvent) {
        // send only errors when there are no receivers
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// SSE endpoint streaming [`DashboardEvent`]s to dashboard sessions.
///
/// A subscriber that falls more than the channel capacity behind skips
/// the missed events and keeps going; dashboards re-fetch current
/// numbers on reconnect anyway.
pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events().subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    match serde_json::to_string(&event) {
                        Ok(json) => yield Ok(Event::default().event("dashboard").data(json)),
                        Err(e) => warn!(error = %e, "Failed to serialize dashboard event"),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "SSE subscriber lagged, skipping events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
