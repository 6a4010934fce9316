//! Background workers that drain the ingest job queue.
//!
//! Each worker runs an independent polling loop: claim a job, execute it,
//! mark it completed or failed. Claims use row locking with `SKIP LOCKED`
//! so any number of workers can share one table safely.

mod orders;
mod revenue;

use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::db::jobs::JobKind;
use crate::error::AppError;
use crate::events::{DashboardEvent, EventBus};
use crate::queue::{IngestJob, JobQueue, RevenuePayload};

/// Idle sleep between polls when the queue is empty.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Base delay for the linear retry backoff. Attempt `n` waits `n` times this.
const RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Shared context handed to every worker.
#[derive(Clone)]
pub struct WorkerContext {
    /// Database pool.
    pub pool: PgPool,
    /// Queue handle for claiming and finishing jobs.
    pub queue: JobQueue,
    /// Bus for dashboard notifications.
    pub events: EventBus,
}

/// Spawn `count` worker loops. They stop when `shutdown` is cancelled.
pub fn spawn_workers(
    ctx: WorkerContext,
    count: usize,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|i| {
            let ctx = ctx.clone();
            let shutdown = shutdown.clone();
            let name = format!("worker-{i}");
            tokio::spawn(async move {
                info!(worker = %name, "Ingest worker started");
                run_worker(&ctx, &name, shutdown).await;
                info!(worker = %name, "Ingest worker stopped");
            })
        })
        .collect()
}

async fn run_worker(ctx: &WorkerContext, name: &str, shutdown: CancellationToken) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }

        match ctx.queue.claim(name).await {
            Ok(Some(job)) => {
                execute_job(ctx, name, job).await;
            }
            Ok(None) => {
                tokio::select! {
                    () = shutdown.cancelled() => return,
                    () = tokio::time::sleep(POLL_INTERVAL) => {}
                }
            }
            Err(e) => {
                error!(worker = %name, error = %e, "Failed to claim job, backing off");
                tokio::select! {
                    () = shutdown.cancelled() => return,
                    () = tokio::time::sleep(RETRY_BACKOFF) => {}
                }
            }
        }
    }
}

async fn execute_job(ctx: &WorkerContext, worker: &str, job: IngestJob) {
    debug!(
        worker = %worker,
        job_id = %job.id,
        kind = ?job.kind,
        attempt = job.attempts,
        "Processing job"
    );

    let result = match job.kind {
        JobKind::OrderCreated => orders::handle_order_created(ctx, &job).await,
        JobKind::RefundCreated => orders::handle_refund_created(ctx, &job).await,
        JobKind::CalculateRevenue => revenue::handle_calculate_revenue(ctx, &job).await,
        JobKind::GdprRequest => {
            // GDPR requests are handled inline by the webhook route; a queued
            // one indicates an enqueue bug rather than pending work.
            Err(AppError::Internal(format!(
                "unexpected queued gdpr_request job {}",
                job.id
            )))
        }
    };

    match result {
        Ok(()) => {
            if let Err(e) = ctx.queue.complete(job.id).await {
                error!(job_id = %job.id, error = %e, "Failed to mark job completed");
            } else {
                debug!(job_id = %job.id, "Job completed");
            }
        }
        Err(e) => {
            let terminal = job.attempts >= job.max_attempts;
            if terminal {
                error!(job_id = %job.id, kind = ?job.kind, error = %e, "Job failed permanently");
                publish_terminal_failure(ctx, &job, &e);
            } else {
                warn!(
                    job_id = %job.id,
                    kind = ?job.kind,
                    attempt = job.attempts,
                    error = %e,
                    "Job attempt failed, will retry"
                );
            }

            if let Err(db_err) = ctx.queue.fail(job.id, &e.to_string(), RETRY_BACKOFF).await {
                error!(job_id = %job.id, error = %db_err, "Failed to record job failure");
            }
        }
    }
}

/// Tell dashboards when a revenue recalculation gives up for good.
fn publish_terminal_failure(ctx: &WorkerContext, job: &IngestJob, error: &AppError) {
    if job.kind != JobKind::CalculateRevenue {
        return;
    }
    let Some(brand_id) = job.brand_id else { return };
    let Ok(payload) = serde_json::from_value::<RevenuePayload>(job.payload.clone()) else {
        return;
    };

    ctx.events.publish(DashboardEvent::RevenueRecalcFailed {
        brand_id,
        date: payload.date,
        error: error.to_string(),
    });
}
