//! Webhook subscription sync.
//!
//! Shopify only delivers topics a shop is subscribed to. This command
//! walks every connected brand and registers whatever subscriptions are
//! missing, pointing them at the ingest service's receiver.
//!
//! GDPR topics are not registered here; Shopify routes those through the
//! app's Partner Dashboard configuration, not the subscriptions API.

use secrecy::SecretString;
use tracing::{info, warn};

use brandpulse_ingest::db::{self, brands};
use brandpulse_ingest::shopify::ShopifyClient;

/// Topics every connected brand must be subscribed to.
const REQUIRED_TOPICS: &[&str] = &["orders/create", "refunds/create"];

/// Ensure required subscriptions exist for every connected brand.
///
/// Brands sharing a shop domain share the shop's subscriptions, so a
/// shop already covered by an earlier brand is skipped. One brand
/// failing logs and continues with the rest.
///
/// # Errors
///
/// Returns an error if environment variables are missing or the brand
/// list cannot be loaded.
pub async fn sync() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("INGEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "INGEST_DATABASE_URL or DATABASE_URL not set")?;
    let base_url = std::env::var("INGEST_BASE_URL").map_err(|_| "INGEST_BASE_URL not set")?;
    let api_version =
        std::env::var("SHOPIFY_API_VERSION").unwrap_or_else(|_| "2026-01".to_string());

    let pool = db::create_pool(&database_url).await?;
    let client = ShopifyClient::new(api_version);
    let address = format!("{}/webhooks/shopify/orders", base_url.trim_end_matches('/'));

    let mut synced_shops = std::collections::HashSet::new();

    for brand in brands::list_shopify_brands(&pool).await? {
        let (Some(shop), Some(token)) = (&brand.shop_domain, &brand.access_token) else {
            continue;
        };
        if !synced_shops.insert(shop.clone()) {
            continue;
        }

        if let Err(e) = sync_shop(&client, shop, token, &address).await {
            warn!(shop = %shop, error = %e, "Webhook sync failed for shop");
        }
    }

    Ok(())
}

async fn sync_shop(
    client: &ShopifyClient,
    shop: &brandpulse_core::ShopDomain,
    token: &str,
    address: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let existing = client.list_webhooks(shop, token).await?;

    for topic in REQUIRED_TOPICS {
        let registered = existing
            .iter()
            .any(|sub| sub.topic == *topic && sub.address == address);
        if registered {
            info!(shop = %shop, topic = %topic, "Subscription already registered");
            continue;
        }

        let sub = client.create_webhook(shop, token, topic, address).await?;
        info!(shop = %shop, topic = %topic, subscription_id = sub.id, "Subscription registered");
    }

    Ok(())
}
