//! Audit log for GDPR webhook requests.
//!
//! Every mandatory privacy webhook is recorded here before any action is
//! taken, so there is a durable trail even when the request is a no-op.

use brandpulse_core::ShopDomain;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

/// Which privacy webhook was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gdpr_topic", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GdprTopic {
    /// `customers/data_request`.
    CustomersDataRequest,
    /// `customers/redact`.
    CustomersRedact,
    /// `shop/redact`.
    ShopRedact,
}

/// Record a received GDPR request.
///
/// # Errors
///
/// Returns error if the database insert fails.
pub async fn record_request(
    pool: &PgPool,
    topic: GdprTopic,
    shop_domain: &ShopDomain,
    payload: &serde_json::Value,
) -> Result<Uuid, RepositoryError> {
    let id: Uuid = sqlx::query_scalar(
        r"
        INSERT INTO gdpr_requests (topic, shop_domain, payload)
        VALUES ($1, $2, $3)
        RETURNING id
        ",
    )
    .bind(topic)
    .bind(shop_domain)
    .bind(payload)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Mark a GDPR request as acted on.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn mark_processed(pool: &PgPool, id: Uuid) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE gdpr_requests SET processed_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
