//! Shopify webhook receivers.
//!
//! Deliveries are verified against the raw body, enqueued, and answered
//! with 200 before any real processing happens. Shopify drops a webhook
//! subscription after too many failed deliveries, so the receiver path
//! does as little as possible.

mod gdpr;
mod orders;
pub mod verify;

use axum::Router;
use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::routing::post;
use brandpulse_core::ShopDomain;

use crate::error::AppError;
use crate::state::AppState;

pub use verify::{sign_payload, verify_signature};

/// Header carrying the base64 HMAC-SHA256 of the raw body.
pub const HMAC_HEADER: &str = "X-Shopify-Hmac-Sha256";
/// Header naming the webhook topic, e.g. `orders/create`.
pub const TOPIC_HEADER: &str = "X-Shopify-Topic";
/// Header naming the originating shop.
pub const SHOP_HEADER: &str = "X-Shopify-Shop-Domain";

/// Build the webhook router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/shopify/orders", post(orders::receive))
        .route("/webhooks/shopify/gdpr", post(gdpr::receive))
}

/// Verified and parsed delivery headers plus the raw body.
struct Delivery {
    topic: String,
    shop_domain: ShopDomain,
    body: Bytes,
}

/// Authenticate a delivery and pull out the headers every topic needs.
///
/// Verification runs on the exact bytes received. Only after the
/// signature checks out are the topic and shop headers trusted.
fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Delivery, AppError> {
    let signature = headers
        .get(HMAC_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing webhook signature".to_string()))?;

    if !verify_signature(&state.config().shopify.webhook_secret, &body, signature) {
        return Err(AppError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    }

    let topic = headers
        .get(TOPIC_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing topic header".to_string()))?
        .to_string();

    let shop_domain = headers
        .get(SHOP_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing shop domain header".to_string()))?
        .parse()
        .map_err(|e| AppError::BadRequest(format!("invalid shop domain: {e}")))?;

    Ok(Delivery {
        topic,
        shop_domain,
        body,
    })
}
