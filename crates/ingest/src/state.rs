//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::IngestConfig;
use crate::events::EventBus;
use crate::queue::JobQueue;

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: IngestConfig,
    pool: PgPool,
    queue: JobQueue,
    events: EventBus,
}

impl AppState {
    /// Assemble the shared state.
    #[must_use]
    pub fn new(config: IngestConfig, pool: PgPool, queue: JobQueue, events: EventBus) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                queue,
                events,
            }),
        }
    }

    /// Service configuration.
    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    /// Database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Job queue handle.
    #[must_use]
    pub fn queue(&self) -> &JobQueue {
        &self.inner.queue
    }

    /// Dashboard event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }
}
