//! Brandpulse ingest service - Shopify order ingestion and reconciliation.
//!
//! This binary serves the webhook receiver on port 3002 and runs the
//! background machinery behind it:
//!
//! - Axum receivers for `orders/create`, `refunds/create`, and the
//!   mandatory privacy webhooks, all HMAC-verified
//! - A Postgres-backed job queue drained by polling workers
//! - An hourly reconciliation scheduler that repairs missed webhooks
//!   against the Shopify Admin API, per brand, in the brand's timezone
//! - An SSE endpoint pushing revenue updates to dashboard sessions
//!
//! Migrations are NOT run automatically on startup. Run them explicitly
//! via: `cargo run -p brandpulse-cli -- migrate`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use sentry::integrations::tracing as sentry_tracing;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use brandpulse_ingest::config::IngestConfig;
use brandpulse_ingest::events::{self, EventBus};
use brandpulse_ingest::queue::JobQueue;
use brandpulse_ingest::reconcile::{self, ReconcileService};
use brandpulse_ingest::shopify::ShopifyClient;
use brandpulse_ingest::state::AppState;
use brandpulse_ingest::webhooks;
use brandpulse_ingest::workers::{self, WorkerContext};
use brandpulse_ingest::db;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &IngestConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = IngestConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration.
    // JSON output on Fly.io, human-readable locally.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "brandpulse_ingest=info,tower_http=debug".into());

    let fmt_layer = if std::env::var("FLY_APP_NAME").is_ok() {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // Build shared services
    let queue = JobQueue::new(pool.clone());
    let event_bus = EventBus::new();
    let shopify = ShopifyClient::new(config.shopify.api_version.clone());
    let state = AppState::new(config.clone(), pool.clone(), queue.clone(), event_bus.clone());

    // Spawn queue workers
    let shutdown = CancellationToken::new();
    let worker_handles = workers::spawn_workers(
        WorkerContext {
            pool: pool.clone(),
            queue: queue.clone(),
            events: event_bus.clone(),
        },
        config.workers,
        shutdown.clone(),
    );
    tracing::info!(workers = config.workers, "Queue workers started");

    // Start reconciliation scheduler (hourly tick + startup catch-up)
    let reconcile_service = Arc::new(ReconcileService::new(
        pool,
        queue,
        shopify,
        config.reconcile_brand_delay,
    ));
    let mut scheduler = reconcile::start_scheduler(reconcile_service)
        .await
        .expect("Failed to start reconciliation scheduler");

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/events", get(events::sse_events))
        .merge(webhooks::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("ingest listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Drain background work before exit
    shutdown.cancel();
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler shutdown error");
    }
    for handle in worker_handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Worker task join error");
        }
    }
    tracing::info!("Shutdown complete");
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
