//! Receivers for Shopify's mandatory privacy webhooks.
//!
//! Shopify requires 401 on a bad signature and 200 on everything else,
//! including our own failures. Each request is written to the audit
//! table first; `shop/redact` then deletes the shop's data. Any failure
//! past signature verification is captured and logged but still answers
//! 200, since Shopify retrying cannot repair our side.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tracing::{error, info, instrument, warn};

use crate::db::gdpr::{self, GdprTopic};
use crate::error::AppError;
use crate::services::redact;
use crate::state::AppState;

use super::authenticate;

/// Verify, audit, and act on a privacy-topic delivery.
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let delivery = authenticate(&state, &headers, body)?;

    let Some(topic) = parse_topic(&delivery.topic) else {
        warn!(topic = %delivery.topic, "Unknown privacy topic");
        return Ok(StatusCode::OK);
    };

    let payload: serde_json::Value = match serde_json::from_slice(&delivery.body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(topic = ?topic, shop = %delivery.shop_domain, error = %e, "Unparseable privacy payload");
            return Ok(StatusCode::OK);
        }
    };

    // The audit row is best-effort: an unreachable database must not
    // turn into a 500 that Shopify keeps retrying.
    let request_id =
        match gdpr::record_request(state.pool(), topic, &delivery.shop_domain, &payload).await {
            Ok(id) => {
                info!(topic = ?topic, shop = %delivery.shop_domain, request_id = %id, "GDPR request recorded");
                Some(id)
            }
            Err(e) => {
                sentry::capture_error(&e);
                error!(topic = ?topic, shop = %delivery.shop_domain, error = %e, "Failed to record GDPR request");
                None
            }
        };

    let completed = match topic {
        // No customer PII is stored beyond Shopify ids, so there is
        // nothing to export or scrub. The audit row is the whole action.
        GdprTopic::CustomersDataRequest | GdprTopic::CustomersRedact => true,
        GdprTopic::ShopRedact => {
            match redact::redact_shop(state.pool(), &delivery.shop_domain).await {
                Ok(summary) => {
                    info!(
                        shop = %delivery.shop_domain,
                        brands_deleted = summary.brands_deleted,
                        users_deleted = summary.users_deleted,
                        "Shop redaction completed"
                    );
                    true
                }
                Err(e) => {
                    // Acknowledged anyway; the audit row keeps the request
                    // visible for manual follow-up.
                    sentry::capture_error(&e);
                    error!(shop = %delivery.shop_domain, error = %e, "Shop redaction failed");
                    false
                }
            }
        }
    };

    if completed {
        if let Some(request_id) = request_id {
            if let Err(e) = gdpr::mark_processed(state.pool(), request_id).await {
                sentry::capture_error(&e);
                error!(request_id = %request_id, error = %e, "Failed to mark GDPR request processed");
            }
        }
    }

    Ok(StatusCode::OK)
}

fn parse_topic(raw: &str) -> Option<GdprTopic> {
    match raw {
        "customers/data_request" => Some(GdprTopic::CustomersDataRequest),
        "customers/redact" => Some(GdprTopic::CustomersRedact),
        "shop/redact" => Some(GdprTopic::ShopRedact),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_privacy_topics_parse() {
        assert_eq!(
            parse_topic("customers/data_request"),
            Some(GdprTopic::CustomersDataRequest)
        );
        assert_eq!(
            parse_topic("customers/redact"),
            Some(GdprTopic::CustomersRedact)
        );
        assert_eq!(parse_topic("shop/redact"), Some(GdprTopic::ShopRedact));
    }

    #[test]
    fn order_topics_are_not_privacy_topics() {
        assert_eq!(parse_topic("orders/create"), None);
        assert_eq!(parse_topic(""), None);
    }
}
