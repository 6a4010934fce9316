//! Database operations for dashboard users and brand memberships.

use brandpulse_core::{BrandId, SignupMethod, UserId};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;

/// A dashboard user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// How the user signed up (drives the GDPR shop-redact rule).
    pub signup_method: SignupMethod,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

/// Create a user (used by the CLI seed command).
///
/// # Errors
///
/// Returns error if the database insert fails (e.g. duplicate email).
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    signup_method: SignupMethod,
) -> Result<User, RepositoryError> {
    let user = sqlx::query_as::<_, User>(
        r"
        INSERT INTO users (email, signup_method)
        VALUES ($1, $2)
        RETURNING id, email, signup_method, created_at
        ",
    )
    .bind(email)
    .bind(signup_method)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Attach a user to a brand.
///
/// # Errors
///
/// Returns error if the database insert fails.
pub async fn add_user_to_brand(
    pool: &PgPool,
    user_id: UserId,
    brand_id: BrandId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO user_brands (user_id, brand_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(brand_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Users who are members of any of the given brands.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn users_for_brands(
    pool: &PgPool,
    brand_ids: &[BrandId],
) -> Result<Vec<User>, RepositoryError> {
    let raw_ids: Vec<i32> = brand_ids.iter().map(|b| b.as_i32()).collect();

    let users = sqlx::query_as::<_, User>(
        r"
        SELECT DISTINCT u.id, u.email, u.signup_method, u.created_at
        FROM users u
        JOIN user_brands ub ON ub.user_id = u.id
        WHERE ub.brand_id = ANY($1)
        ",
    )
    .bind(&raw_ids)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Number of brands a user still belongs to.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn remaining_brand_count(pool: &PgPool, user_id: UserId) -> Result<i64, RepositoryError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM user_brands WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok(count)
}

/// Delete a user.
///
/// # Errors
///
/// Returns error if the database delete fails.
pub async fn delete_user(pool: &PgPool, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}
