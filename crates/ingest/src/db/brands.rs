//! Database operations for brands (tenant records).

use brandpulse_core::{BrandId, ShopDomain};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use super::RepositoryError;

/// A brand (tenant) connected to the dashboard.
///
/// `shop_domain` and `access_token` are both present when Shopify is
/// connected; reconciliation only considers brands where that holds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Brand {
    /// Unique brand ID.
    pub id: BrandId,
    /// Display name.
    pub name: String,
    /// Connected Shopify shop domain.
    pub shop_domain: Option<ShopDomain>,
    /// Shopify Admin API access token for this shop.
    pub access_token: Option<String>,
    /// IANA timezone name (e.g. "America/New_York").
    pub timezone: String,
    /// Last date reconciliation completed for (brand-local).
    pub last_reconciled_date: Option<NaiveDate>,
    /// When the brand was created.
    pub created_at: DateTime<Utc>,
    /// When the brand was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Brand {
    /// Parse the stored IANA timezone name.
    ///
    /// # Errors
    ///
    /// Returns `DataCorruption` if the stored name is not a valid zone.
    pub fn tz(&self) -> Result<chrono_tz::Tz, RepositoryError> {
        self.timezone.parse().map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "brand {} has invalid timezone {:?}",
                self.id, self.timezone
            ))
        })
    }
}

/// Get a brand by ID.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn get_brand(pool: &PgPool, brand_id: BrandId) -> Result<Option<Brand>, RepositoryError> {
    let brand = sqlx::query_as::<_, Brand>(
        r"
        SELECT
            id, name, shop_domain, access_token, timezone,
            last_reconciled_date, created_at, updated_at
        FROM brands
        WHERE id = $1
        ",
    )
    .bind(brand_id)
    .fetch_optional(pool)
    .await?;

    Ok(brand)
}

/// Get all brands connected to a shop domain.
///
/// A shop can back more than one brand workspace, so this returns a list.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn get_brands_by_shop_domain(
    pool: &PgPool,
    shop_domain: &ShopDomain,
) -> Result<Vec<Brand>, RepositoryError> {
    let brands = sqlx::query_as::<_, Brand>(
        r"
        SELECT
            id, name, shop_domain, access_token, timezone,
            last_reconciled_date, created_at, updated_at
        FROM brands
        WHERE shop_domain = $1
        ",
    )
    .bind(shop_domain)
    .fetch_all(pool)
    .await?;

    Ok(brands)
}

/// List all brands with a Shopify connection, oldest first.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn list_shopify_brands(pool: &PgPool) -> Result<Vec<Brand>, RepositoryError> {
    let brands = sqlx::query_as::<_, Brand>(
        r"
        SELECT
            id, name, shop_domain, access_token, timezone,
            last_reconciled_date, created_at, updated_at
        FROM brands
        WHERE shop_domain IS NOT NULL AND access_token IS NOT NULL
        ORDER BY id
        ",
    )
    .fetch_all(pool)
    .await?;

    Ok(brands)
}

/// Record that reconciliation completed through `date` for a brand.
///
/// `GREATEST` keeps a concurrent older run from winding the marker back.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn mark_reconciled(
    pool: &PgPool,
    brand_id: BrandId,
    date: NaiveDate,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE brands
        SET last_reconciled_date = GREATEST(COALESCE(last_reconciled_date, $2), $2),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(brand_id)
    .bind(date)
    .execute(pool)
    .await?;

    Ok(())
}

/// Create a brand (used by the CLI seed command).
///
/// # Errors
///
/// Returns error if the database insert fails.
pub async fn create_brand(
    pool: &PgPool,
    name: &str,
    shop_domain: Option<&ShopDomain>,
    access_token: Option<&str>,
    timezone: &str,
) -> Result<Brand, RepositoryError> {
    let brand = sqlx::query_as::<_, Brand>(
        r"
        INSERT INTO brands (name, shop_domain, access_token, timezone)
        VALUES ($1, $2, $3, $4)
        RETURNING
            id, name, shop_domain, access_token, timezone,
            last_reconciled_date, created_at, updated_at
        ",
    )
    .bind(name)
    .bind(shop_domain)
    .bind(access_token)
    .bind(timezone)
    .fetch_one(pool)
    .await?;

    Ok(brand)
}

/// Delete all brands for a shop domain, returning the deleted brand ids.
///
/// Orders, metrics, and brand memberships cascade in the database.
///
/// # Errors
///
/// Returns error if the database delete fails.
pub async fn delete_brands_by_shop_domain(
    pool: &PgPool,
    shop_domain: &ShopDomain,
) -> Result<Vec<BrandId>, RepositoryError> {
    let ids: Vec<BrandId> =
        sqlx::query_scalar("DELETE FROM brands WHERE shop_domain = $1 RETURNING id")
            .bind(shop_domain)
            .fetch_all(pool)
            .await?;

    Ok(ids)
}
