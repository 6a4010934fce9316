//! Database migration command.
//!
//! Migrations live in `crates/ingest/migrations/` and are embedded at
//! compile time, so the CLI binary carries them wherever it is deployed.
//!
//! # Environment Variables
//!
//! - `INGEST_DATABASE_URL` - `PostgreSQL` connection string, falling
//!   back to `DATABASE_URL`

use sqlx::PgPool;

/// Errors from the migrate command.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Neither database URL variable is set.
    #[error("Missing environment variable: set INGEST_DATABASE_URL or DATABASE_URL")]
    MissingDatabaseUrl,

    /// Connection failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run ingest database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection
/// fails, or a migration fails to apply.
pub async fn ingest() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("INGEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| MigrationError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to ingest database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running ingest migrations...");
    sqlx::migrate!("../ingest/migrations").run(&pool).await?;

    tracing::info!("Ingest migrations complete!");
    Ok(())
}
