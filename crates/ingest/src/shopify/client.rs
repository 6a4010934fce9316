//! Shopify Admin REST API client.
//!
//! Reconciliation uses this to pull a day's orders back out of Shopify,
//! and the CLI uses it to register webhook subscriptions per brand.

use brandpulse_core::ShopDomain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ShopifyError;
use super::types::OrderPayload;

/// Orders per page, the Admin API maximum.
const PAGE_SIZE: u32 = 250;

/// Shopify Admin REST API client.
///
/// Holds no credentials of its own. Each brand stores its own access
/// token, passed per call, so one client serves every tenant.
#[derive(Clone)]
pub struct ShopifyClient {
    client: reqwest::Client,
    api_version: String,
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<OrderPayload>,
}

#[derive(Debug, Deserialize)]
struct WebhooksResponse {
    webhooks: Vec<WebhookSubscription>,
}

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    webhook: WebhookSubscription,
}

/// A registered webhook subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSubscription {
    /// Subscription ID.
    pub id: i64,
    /// Webhook topic, e.g. `orders/create`.
    pub topic: String,
    /// Delivery URL.
    pub address: String,
}

#[derive(Debug, Serialize)]
struct CreateWebhookRequest<'a> {
    webhook: CreateWebhookBody<'a>,
}

#[derive(Debug, Serialize)]
struct CreateWebhookBody<'a> {
    topic: &'a str,
    address: &'a str,
    format: &'static str,
}

impl ShopifyClient {
    /// Create a new Admin API client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(api_version: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_version: api_version.into(),
        }
    }

    fn base_url(&self, shop: &ShopDomain) -> String {
        format!("https://{shop}/admin/api/{}", self.api_version)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Fetch every order created in `[start, end)`, following pagination.
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` on a 429, `Api` on any other non-success
    /// status, or `Http` if the request itself fails.
    #[instrument(skip(self, access_token), fields(shop = %shop))]
    pub async fn fetch_orders(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrderPayload>, ShopifyError> {
        let first_page = format!(
            "{}/orders.json?status=any&limit={PAGE_SIZE}&created_at_min={}&created_at_max={}",
            self.base_url(shop),
            start.to_rfc3339(),
            end.to_rfc3339(),
        );

        let mut orders = Vec::new();
        let mut url = Some(first_page);

        while let Some(page_url) = url.take() {
            let response = self
                .client
                .get(&page_url)
                .header("X-Shopify-Access-Token", access_token)
                .send()
                .await?;

            let next = response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_link);

            let page: OrdersResponse = Self::read_json(response).await?;
            orders.extend(page.orders);
            url = next;
        }

        Ok(orders)
    }

    // =========================================================================
    // Webhook subscriptions
    // =========================================================================

    /// List the shop's registered webhook subscriptions.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Shopify rejects it.
    #[instrument(skip(self, access_token), fields(shop = %shop))]
    pub async fn list_webhooks(
        &self,
        shop: &ShopDomain,
        access_token: &str,
    ) -> Result<Vec<WebhookSubscription>, ShopifyError> {
        let response = self
            .client
            .get(format!("{}/webhooks.json", self.base_url(shop)))
            .header("X-Shopify-Access-Token", access_token)
            .send()
            .await?;

        let body: WebhooksResponse = Self::read_json(response).await?;
        Ok(body.webhooks)
    }

    /// Register a webhook subscription for a topic.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Shopify rejects it.
    #[instrument(skip(self, access_token), fields(shop = %shop, topic = %topic))]
    pub async fn create_webhook(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        topic: &str,
        address: &str,
    ) -> Result<WebhookSubscription, ShopifyError> {
        let response = self
            .client
            .post(format!("{}/webhooks.json", self.base_url(shop)))
            .header("X-Shopify-Access-Token", access_token)
            .json(&CreateWebhookRequest {
                webhook: CreateWebhookBody {
                    topic,
                    address,
                    format: "json",
                },
            })
            .send()
            .await?;

        let body: WebhookResponse = Self::read_json(response).await?;
        Ok(body.webhook)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ShopifyError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(2);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.chars().take(500).collect();
            return Err(ShopifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

/// Extract the `rel="next"` URL from a Link header, if present.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (url, params) = part.split_once(';')?;
        if params.contains("rel=\"next\"") {
            Some(url.trim().trim_start_matches('<').trim_end_matches('>').to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_link_finds_next_relation() {
        let header = "<https://shop.myshopify.com/admin/api/2026-01/orders.json?page_info=abc>; rel=\"previous\", <https://shop.myshopify.com/admin/api/2026-01/orders.json?page_info=def>; rel=\"next\"";
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://shop.myshopify.com/admin/api/2026-01/orders.json?page_info=def")
        );
    }

    #[test]
    fn next_link_absent_on_last_page() {
        let header = "<https://shop.myshopify.com/admin/api/2026-01/orders.json?page_info=abc>; rel=\"previous\"";
        assert_eq!(next_link(header), None);
    }

    #[test]
    fn next_link_handles_empty_header() {
        assert_eq!(next_link(""), None);
    }
}
