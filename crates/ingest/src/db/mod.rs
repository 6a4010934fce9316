//! Database operations for the ingest `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `brands` - Tenant records (Shopify domain, access token, timezone)
//! - `users` / `user_brands` - Dashboard users and their brand memberships
//! - `shopify_orders` - One row per Shopify order, scoped to a brand
//! - `ingest_jobs` - Durable webhook/reconciliation job queue
//! - `daily_metrics` - Per-brand daily revenue aggregates
//! - `gdpr_requests` - Audit log of inbound GDPR webhooks
//!
//! # Migrations
//!
//! Migrations are stored in `crates/ingest/migrations/` and run via:
//! ```bash
//! cargo run -p brandpulse-cli -- migrate
//! ```

pub mod brands;
pub mod gdpr;
pub mod jobs;
pub mod metrics;
pub mod orders;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate shop domain).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
