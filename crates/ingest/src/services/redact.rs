//! Shop redaction for the `shop/redact` privacy webhook.
//!
//! Shopify sends this 48 hours after a store uninstalls the app. All data
//! derived from that store must go: brands, their orders, their rollups.
//! Users are the subtle part. An account created through the Shopify
//! install with no other workspace left is deleted outright; an account
//! that signed up by email, or still belongs to another brand, only loses
//! the association.

use brandpulse_core::{ShopDomain, SignupMethod};
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::db::{brands, users};
use crate::error::AppError;

/// What a redaction run removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactSummary {
    /// Brands deleted, with their orders and metrics cascading.
    pub brands_deleted: usize,
    /// User accounts deleted outright.
    pub users_deleted: usize,
}

/// Whether a user account should be removed along with the shop.
///
/// Shopify-originated accounts exist only because of the install, so once
/// their last brand is gone there is nothing left to keep. Email signups
/// own their account independently of any store.
#[must_use]
pub const fn should_delete_user(remaining_brands: i64, signup_method: SignupMethod) -> bool {
    remaining_brands == 0 && matches!(signup_method, SignupMethod::Shopify)
}

/// Delete everything derived from a shop.
///
/// Order, metrics, and membership rows cascade from the brand delete.
/// This is not transactional end to end: brands go first, then users are
/// re-checked against what actually remains, so a crash in between leaves
/// only orphan-free users behind, never half-deleted brands.
///
/// # Errors
///
/// Returns error if any database step fails.
#[instrument(skip(pool), fields(shop = %shop_domain))]
pub async fn redact_shop(
    pool: &PgPool,
    shop_domain: &ShopDomain,
) -> Result<RedactSummary, AppError> {
    let affected = brands::get_brands_by_shop_domain(pool, shop_domain).await?;
    let brand_ids: Vec<_> = affected.iter().map(|b| b.id).collect();
    let members = users::users_for_brands(pool, &brand_ids).await?;

    let deleted_brands = brands::delete_brands_by_shop_domain(pool, shop_domain).await?;

    let mut users_deleted = 0usize;
    for user in members {
        let remaining = users::remaining_brand_count(pool, user.id).await?;
        if should_delete_user(remaining, user.signup_method) {
            users::delete_user(pool, user.id).await?;
            users_deleted += 1;
        }
    }

    info!(
        shop = %shop_domain,
        brands_deleted = deleted_brands.len(),
        users_deleted,
        "Shop redacted"
    );

    Ok(RedactSummary {
        brands_deleted: deleted_brands.len(),
        users_deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shopify_user_with_no_brands_left_is_deleted() {
        assert!(should_delete_user(0, SignupMethod::Shopify));
    }

    #[test]
    fn shopify_user_with_other_brands_is_kept() {
        assert!(!should_delete_user(1, SignupMethod::Shopify));
        assert!(!should_delete_user(3, SignupMethod::Shopify));
    }

    #[test]
    fn email_user_is_always_kept() {
        assert!(!should_delete_user(0, SignupMethod::Email));
        assert!(!should_delete_user(2, SignupMethod::Email));
    }
}
