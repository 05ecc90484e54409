//! Queue client adapter.
//!
//! The job-queue engine lives behind [`QueueEngine`]; every call takes the
//! namespace explicitly so a single engine connection can serve any number
//! of isolated environments. Handlers never talk to the engine directly:
//! they go through a [`NamespaceClient`] bound to the namespace from the URL.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;

pub mod model;
pub mod postgres;

pub use model::{
    DeadJob, DeadJobKey, Job, Queue, RetryJob, ScheduledJob, WorkerObservation,
    WorkerPoolHeartbeat,
};
pub use postgres::PgQueueEngine;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Fixed number of jobs per page for the retry, scheduled and dead sets.
pub const PAGE_SIZE: u64 = 20;

/// Operations the management API needs from the job-queue engine.
///
/// Pages are 1-indexed and hold [`PAGE_SIZE`] entries; an out-of-range page
/// yields an empty slice together with the full set size.
#[async_trait]
pub trait QueueEngine: Send + Sync {
    async fn queues(&self, ns: &str) -> EngineResult<Vec<Queue>>;

    async fn worker_pool_heartbeats(&self, ns: &str) -> EngineResult<Vec<WorkerPoolHeartbeat>>;

    async fn worker_observations(&self, ns: &str) -> EngineResult<Vec<WorkerObservation>>;

    async fn retry_jobs(&self, ns: &str, page: u64) -> EngineResult<(Vec<RetryJob>, i64)>;

    async fn scheduled_jobs(&self, ns: &str, page: u64) -> EngineResult<(Vec<ScheduledJob>, i64)>;

    async fn dead_jobs(&self, ns: &str, page: u64) -> EngineResult<(Vec<DeadJob>, i64)>;

    async fn delete_dead_job(&self, ns: &str, died_at: i64, job_id: &str) -> EngineResult<()>;

    async fn retry_dead_job(&self, ns: &str, died_at: i64, job_id: &str) -> EngineResult<()>;

    async fn delete_all_dead_jobs(&self, ns: &str) -> EngineResult<()>;

    async fn retry_all_dead_jobs(&self, ns: &str) -> EngineResult<()>;
}

pub type SharedEngine = Arc<dyn QueueEngine>;

/// Engine handle bound to one namespace for the lifetime of a request.
#[derive(Clone)]
pub struct NamespaceClient {
    namespace: String,
    engine: SharedEngine,
}

impl NamespaceClient {
    pub fn new(namespace: impl Into<String>, engine: SharedEngine) -> Self {
        Self {
            namespace: namespace.into(),
            engine,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn queues(&self) -> EngineResult<Vec<Queue>> {
        self.engine.queues(&self.namespace).await
    }

    pub async fn worker_pool_heartbeats(&self) -> EngineResult<Vec<WorkerPoolHeartbeat>> {
        self.engine.worker_pool_heartbeats(&self.namespace).await
    }

    pub async fn worker_observations(&self) -> EngineResult<Vec<WorkerObservation>> {
        self.engine.worker_observations(&self.namespace).await
    }

    /// Observations filtered down to workers currently running a job.
    pub async fn busy_workers(&self) -> EngineResult<Vec<WorkerObservation>> {
        let observations = self.worker_observations().await?;
        Ok(observations.into_iter().filter(|ob| ob.is_busy).collect())
    }

    pub async fn retry_jobs(&self, page: u64) -> EngineResult<(Vec<RetryJob>, i64)> {
        self.engine.retry_jobs(&self.namespace, page).await
    }

    pub async fn scheduled_jobs(&self, page: u64) -> EngineResult<(Vec<ScheduledJob>, i64)> {
        self.engine.scheduled_jobs(&self.namespace, page).await
    }

    pub async fn dead_jobs(&self, page: u64) -> EngineResult<(Vec<DeadJob>, i64)> {
        self.engine.dead_jobs(&self.namespace, page).await
    }

    pub async fn delete_dead_job(&self, key: &DeadJobKey) -> EngineResult<()> {
        self.engine
            .delete_dead_job(&self.namespace, key.died_at, &key.job_id)
            .await
    }

    pub async fn retry_dead_job(&self, key: &DeadJobKey) -> EngineResult<()> {
        self.engine
            .retry_dead_job(&self.namespace, key.died_at, &key.job_id)
            .await
    }

    pub async fn delete_all_dead_jobs(&self) -> EngineResult<()> {
        self.engine.delete_all_dead_jobs(&self.namespace).await
    }

    pub async fn retry_all_dead_jobs(&self) -> EngineResult<()> {
        self.engine.retry_all_dead_jobs(&self.namespace).await
    }
}

/// Zero-based row offset of a 1-indexed page.
pub fn page_offset(page: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(PAGE_SIZE)
}
