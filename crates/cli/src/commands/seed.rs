//! Seed a brand and owning user for local development.
//!
//! Gives a fresh database something for the webhook receiver to match
//! deliveries against, and for reconciliation to pick up once the brand
//! has a real access token.

use secrecy::SecretString;
use tracing::info;

use brandpulse_core::{ShopDomain, SignupMethod};
use brandpulse_ingest::db::{self, brands, users};

/// Create a brand, a user, and the membership linking them.
///
/// The user's signup method is `shopify` when a shop domain is given,
/// mirroring the install flow, and `email` otherwise.
///
/// # Errors
///
/// Returns an error if environment variables are missing, the shop
/// domain is invalid, or database operations fail.
pub async fn brand(
    name: &str,
    shop_domain: Option<&str>,
    access_token: Option<&str>,
    timezone: &str,
    email: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("INGEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "INGEST_DATABASE_URL or DATABASE_URL not set")?;

    // Validate inputs before touching the database
    let shop_domain = shop_domain.map(ShopDomain::parse).transpose()?;
    let _: chrono_tz::Tz = timezone
        .parse()
        .map_err(|_| format!("invalid timezone: {timezone}"))?;

    let pool = db::create_pool(&database_url).await?;

    let created = brands::create_brand(
        &pool,
        name,
        shop_domain.as_ref(),
        access_token,
        timezone,
    )
    .await?;
    info!(brand_id = %created.id, name = %created.name, "Brand created");

    let signup_method = if shop_domain.is_some() {
        SignupMethod::Shopify
    } else {
        SignupMethod::Email
    };
    let user = users::create_user(&pool, email, signup_method).await?;
    users::add_user_to_brand(&pool, user.id, created.id).await?;
    info!(user_id = %user.id, email = %user.email, "User created and attached");

    Ok(())
}
