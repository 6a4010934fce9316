//! Receiver for `orders/create` and `refunds/create` deliveries.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tracing::{info, instrument, warn};

use crate::db::brands;
use crate::error::AppError;
use crate::queue::JobSource;
use crate::state::AppState;

use super::authenticate;

/// Verify, enqueue, and acknowledge an order-topic delivery.
///
/// Two cases still answer 200 without enqueueing: a shop no brand is
/// connected to, and a topic we never subscribed to. Shopify retries on
/// anything else and eventually drops the subscription, so an error
/// status is reserved for deliveries a retry could actually fix.
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let delivery = authenticate(&state, &headers, body)?;

    let payload: serde_json::Value = serde_json::from_slice(&delivery.body)
        .map_err(|e| AppError::BadRequest(format!("invalid webhook body: {e}")))?;

    let known = brands::get_brands_by_shop_domain(state.pool(), &delivery.shop_domain).await?;
    if known.is_empty() {
        warn!(
            shop = %delivery.shop_domain,
            topic = %delivery.topic,
            "Webhook from unknown shop, acknowledging without enqueue"
        );
        return Ok(StatusCode::OK);
    }

    match delivery.topic.as_str() {
        "orders/create" => {
            state
                .queue()
                .enqueue_order_created(&delivery.shop_domain, JobSource::Webhook, payload)
                .await?;
        }
        "refunds/create" => {
            state
                .queue()
                .enqueue_refund_created(&delivery.shop_domain, JobSource::Webhook, payload)
                .await?;
        }
        other => {
            warn!(topic = %other, shop = %delivery.shop_domain, "Unhandled webhook topic");
            return Ok(StatusCode::OK);
        }
    }

    info!(shop = %delivery.shop_domain, topic = %delivery.topic, "Webhook enqueued");
    Ok(StatusCode::OK)
}
