// crates/workwebui/src/client/postgres.rs

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;

use crate::client::model::{
    DeadJob, Job, Queue, RetryJob, ScheduledJob, WorkerObservation, WorkerPoolHeartbeat,
};
use crate::client::{page_offset, EngineResult, QueueEngine, PAGE_SIZE};
use crate::error::EngineError;

/// Sorted-set membership of a row in `work_jobs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSet {
    Queued,
    Scheduled,
    Retry,
    Dead,
}

impl JobSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobSet::Queued => "queued",
            JobSet::Scheduled => "scheduled",
            JobSet::Retry => "retry",
            JobSet::Dead => "dead",
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    job_id: String,
    name: String,
    enqueued_at: i64,
    args: Value,
    is_unique: bool,
    fails: i64,
    last_err: Option<String>,
    failed_at: Option<i64>,
    score: i64,
}

impl JobRow {
    fn into_job(self) -> (i64, Job) {
        (
            self.score,
            Job {
                name: self.name,
                id: self.job_id,
                enqueued_at: self.enqueued_at,
                args: self.args,
                unique: self.is_unique,
                fails: self.fails,
                last_err: self.last_err,
                failed_at: self.failed_at,
            },
        )
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QueueRow {
    job_name: String,
    count: i64,
    latency: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct HeartbeatRow {
    worker_pool_id: String,
    started_at: i64,
    heartbeat_at: i64,
    job_names: Vec<String>,
    concurrency: i64,
    host: String,
    pid: i64,
    worker_ids: Vec<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ObservationRow {
    worker_id: String,
    job_name: Option<String>,
    job_id: Option<String>,
    started_at: Option<i64>,
    args_json: Option<String>,
    checkin: Option<String>,
    checkin_at: Option<i64>,
}

impl From<ObservationRow> for WorkerObservation {
    fn from(row: ObservationRow) -> Self {
        // A worker without a current job has no observation row at all.
        if row.job_id.is_none() {
            return WorkerObservation::idle(row.worker_id);
        }

        WorkerObservation {
            worker_id: row.worker_id,
            is_busy: true,
            job_name: row.job_name,
            job_id: row.job_id,
            started_at: row.started_at,
            args_json: row.args_json,
            checkin: row.checkin,
            checkin_at: row.checkin_at,
        }
    }
}

/// [`QueueEngine`] over the `work_*` tables in PostgreSQL.
#[derive(Clone)]
pub struct PgQueueEngine {
    pool: PgPool,
}

impl PgQueueEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ----------------------------
    // Paged set reads
    // ----------------------------

    /// One page of a job set ordered by score, plus the full set size.
    ///
    /// Both reads share one snapshot so `count` always describes the same
    /// set the page was cut from.
    async fn job_page(
        &self,
        ns: &str,
        set: JobSet,
        page: u64,
    ) -> EngineResult<(Vec<(i64, Job)>, i64)> {
        let offset = i64::try_from(page_offset(page)).unwrap_or(i64::MAX);

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT
                job_id, name, enqueued_at, args,
                is_unique, fails, last_err, failed_at,
                score
            FROM work_jobs
            WHERE namespace = $1 AND state = $2
            ORDER BY score ASC, job_id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(ns)
        .bind(set.as_str())
        .bind(PAGE_SIZE as i64)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM work_jobs WHERE namespace = $1 AND state = $2",
        )
        .bind(ns)
        .bind(set.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((rows.into_iter().map(JobRow::into_job).collect(), count))
    }
}

#[async_trait]
impl QueueEngine for PgQueueEngine {
    async fn queues(&self, ns: &str) -> EngineResult<Vec<Queue>> {
        let now = Utc::now().timestamp();

        let rows = sqlx::query_as::<_, QueueRow>(
            r#"
            SELECT
                k.name AS job_name,
                COUNT(j.row_id) AS count,
                COALESCE($2 - MIN(j.enqueued_at), 0)::BIGINT AS latency
            FROM work_known_jobs k
            LEFT JOIN work_jobs j
              ON j.namespace = k.namespace
             AND j.name = k.name
             AND j.state = 'queued'
            WHERE k.namespace = $1
            GROUP BY k.name
            ORDER BY k.name ASC
            "#,
        )
        .bind(ns)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Queue {
                job_name: r.job_name,
                count: r.count,
                latency: r.latency,
            })
            .collect())
    }

    async fn worker_pool_heartbeats(&self, ns: &str) -> EngineResult<Vec<WorkerPoolHeartbeat>> {
        let rows = sqlx::query_as::<_, HeartbeatRow>(
            r#"
            SELECT
                worker_pool_id, started_at, heartbeat_at,
                job_names, concurrency, host, pid, worker_ids
            FROM work_worker_pools
            WHERE namespace = $1
            ORDER BY worker_pool_id ASC
            "#,
        )
        .bind(ns)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| WorkerPoolHeartbeat {
                worker_pool_id: r.worker_pool_id,
                started_at: r.started_at,
                heartbeat_at: r.heartbeat_at,
                job_names: r.job_names,
                concurrency: r.concurrency,
                host: r.host,
                pid: r.pid,
                worker_ids: r.worker_ids,
            })
            .collect())
    }

    async fn worker_observations(&self, ns: &str) -> EngineResult<Vec<WorkerObservation>> {
        // Every worker id announced by a live pool, joined to what it is running.
        let rows = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT
                ids.worker_id,
                o.job_name, o.job_id, o.started_at,
                o.args_json, o.checkin, o.checkin_at
            FROM work_worker_pools p
            CROSS JOIN LATERAL unnest(p.worker_ids) AS ids(worker_id)
            LEFT JOIN work_worker_observations o
              ON o.namespace = p.namespace
             AND o.worker_id = ids.worker_id
            WHERE p.namespace = $1
            ORDER BY ids.worker_id ASC
            "#,
        )
        .bind(ns)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WorkerObservation::from).collect())
    }

    async fn retry_jobs(&self, ns: &str, page: u64) -> EngineResult<(Vec<RetryJob>, i64)> {
        let (rows, count) = self.job_page(ns, JobSet::Retry, page).await?;
        let jobs = rows
            .into_iter()
            .map(|(retry_at, job)| RetryJob { retry_at, job })
            .collect();
        Ok((jobs, count))
    }

    async fn scheduled_jobs(&self, ns: &str, page: u64) -> EngineResult<(Vec<ScheduledJob>, i64)> {
        let (rows, count) = self.job_page(ns, JobSet::Scheduled, page).await?;
        let jobs = rows
            .into_iter()
            .map(|(run_at, job)| ScheduledJob { run_at, job })
            .collect();
        Ok((jobs, count))
    }

    async fn dead_jobs(&self, ns: &str, page: u64) -> EngineResult<(Vec<DeadJob>, i64)> {
        let (rows, count) = self.job_page(ns, JobSet::Dead, page).await?;
        let jobs = rows
            .into_iter()
            .map(|(died_at, job)| DeadJob { died_at, job })
            .collect();
        Ok((jobs, count))
    }

    // ----------------------------
    // Dead set mutations
    // ----------------------------

    async fn delete_dead_job(&self, ns: &str, died_at: i64, job_id: &str) -> EngineResult<()> {
        let res = sqlx::query(
            r#"
            DELETE FROM work_jobs
            WHERE namespace = $1 AND state = 'dead'
              AND score = $2 AND job_id = $3
            "#,
        )
        .bind(ns)
        .bind(died_at)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(EngineError::NotDeleted);
        }
        Ok(())
    }

    async fn retry_dead_job(&self, ns: &str, died_at: i64, job_id: &str) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        let name: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE work_jobs
            SET state = 'queued', score = enqueued_at
            WHERE namespace = $1 AND state = 'dead'
              AND score = $2 AND job_id = $3
            RETURNING name
            "#,
        )
        .bind(ns)
        .bind(died_at)
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(name) = name else {
            return Err(EngineError::NotRetried);
        };

        // the queue must be visible on /queues once the job is back on it
        sqlx::query(
            r#"
            INSERT INTO work_known_jobs (namespace, name)
            VALUES ($1, $2)
            ON CONFLICT (namespace, name) DO NOTHING
            "#,
        )
        .bind(ns)
        .bind(&name)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_all_dead_jobs(&self, ns: &str) -> EngineResult<()> {
        sqlx::query("DELETE FROM work_jobs WHERE namespace = $1 AND state = 'dead'")
            .bind(ns)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn retry_all_dead_jobs(&self, ns: &str) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO work_known_jobs (namespace, name)
            SELECT DISTINCT namespace, name
            FROM work_jobs
            WHERE namespace = $1 AND state = 'dead'
            ON CONFLICT (namespace, name) DO NOTHING
            "#,
        )
        .bind(ns)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE work_jobs
            SET state = 'queued', score = enqueued_at
            WHERE namespace = $1 AND state = 'dead'
            "#,
        )
        .bind(ns)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
