#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{watch, Notify};

use workwebui::client::{
    page_offset, DeadJob, EngineResult, Job, Queue, QueueEngine, RetryJob, ScheduledJob,
    WorkerObservation, WorkerPoolHeartbeat, PAGE_SIZE,
};
use workwebui::EngineError;

pub const BASE_DIED_AT: i64 = 1_700_000_000;

/// One engine call as seen by the mock, namespace included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Read { op: &'static str, ns: String },
    Page { op: &'static str, ns: String, page: u64 },
    DeleteDeadJob { ns: String, died_at: i64, job_id: String },
    RetryDeadJob { ns: String, died_at: i64, job_id: String },
    DeleteAllDeadJobs { ns: String },
    RetryAllDeadJobs { ns: String },
}

#[derive(Debug, Default, Clone)]
pub struct NamespaceData {
    pub queues: Vec<Queue>,
    pub heartbeats: Vec<WorkerPoolHeartbeat>,
    pub observations: Vec<WorkerObservation>,
    pub retry: Vec<RetryJob>,
    pub scheduled: Vec<ScheduledJob>,
    pub dead: Vec<DeadJob>,
}

/// In-memory engine. Deleting or retrying a key that is not present is a
/// successful no-op, like an engine whose set removal reports nothing.
#[derive(Default)]
pub struct MockEngine {
    data: Mutex<HashMap<String, NamespaceData>>,
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<String>>,
    gate: Mutex<Option<watch::Receiver<bool>>>,
    entered: Notify,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_namespace(self: &Arc<Self>, ns: &str, data: NamespaceData) -> Arc<Self> {
        self.data.lock().unwrap().insert(ns.to_string(), data);
        Arc::clone(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn dead_count(&self, ns: &str) -> usize {
        self.data
            .lock()
            .unwrap()
            .get(ns)
            .map(|d| d.dead.len())
            .unwrap_or(0)
    }

    /// Every subsequent call fails with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Hold every subsequent call until the returned sender sends `true`.
    pub fn hold(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Resolves once a call has reached the engine.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    async fn enter(&self, call: Call) -> EngineResult<()> {
        self.calls.lock().unwrap().push(call);
        self.entered.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(mut rx) = gate {
            let _ = rx.wait_for(|open| *open).await;
        }

        let failure = self.failure.lock().unwrap().clone();
        match failure {
            Some(message) => Err(EngineError::Backend(message)),
            None => Ok(()),
        }
    }

    fn read<T>(&self, ns: &str, f: impl FnOnce(&NamespaceData) -> T) -> T
    where
        T: Default,
    {
        self.data.lock().unwrap().get(ns).map(f).unwrap_or_default()
    }

    fn write(&self, ns: &str, f: impl FnOnce(&mut NamespaceData)) {
        let mut data = self.data.lock().unwrap();
        f(data.entry(ns.to_string()).or_default());
    }
}

fn page_of<T: Clone>(items: &[T], page: u64) -> (Vec<T>, i64) {
    let start = usize::try_from(page_offset(page)).unwrap_or(usize::MAX);
    let jobs = items
        .iter()
        .skip(start)
        .take(PAGE_SIZE as usize)
        .cloned()
        .collect();
    (jobs, items.len() as i64)
}

#[async_trait]
impl QueueEngine for MockEngine {
    async fn queues(&self, ns: &str) -> EngineResult<Vec<Queue>> {
        self.enter(Call::Read { op: "queues", ns: ns.into() }).await?;
        Ok(self.read(ns, |d| d.queues.clone()))
    }

    async fn worker_pool_heartbeats(&self, ns: &str) -> EngineResult<Vec<WorkerPoolHeartbeat>> {
        self.enter(Call::Read { op: "worker_pool_heartbeats", ns: ns.into() })
            .await?;
        Ok(self.read(ns, |d| d.heartbeats.clone()))
    }

    async fn worker_observations(&self, ns: &str) -> EngineResult<Vec<WorkerObservation>> {
        self.enter(Call::Read { op: "worker_observations", ns: ns.into() })
            .await?;
        Ok(self.read(ns, |d| d.observations.clone()))
    }

    async fn retry_jobs(&self, ns: &str, page: u64) -> EngineResult<(Vec<RetryJob>, i64)> {
        self.enter(Call::Page { op: "retry_jobs", ns: ns.into(), page })
            .await?;
        Ok(self.read(ns, |d| page_of(&d.retry, page)))
    }

    async fn scheduled_jobs(&self, ns: &str, page: u64) -> EngineResult<(Vec<ScheduledJob>, i64)> {
        self.enter(Call::Page { op: "scheduled_jobs", ns: ns.into(), page })
            .await?;
        Ok(self.read(ns, |d| page_of(&d.scheduled, page)))
    }

    async fn dead_jobs(&self, ns: &str, page: u64) -> EngineResult<(Vec<DeadJob>, i64)> {
        self.enter(Call::Page { op: "dead_jobs", ns: ns.into(), page })
            .await?;
        Ok(self.read(ns, |d| page_of(&d.dead, page)))
    }

    async fn delete_dead_job(&self, ns: &str, died_at: i64, job_id: &str) -> EngineResult<()> {
        self.enter(Call::DeleteDeadJob {
            ns: ns.into(),
            died_at,
            job_id: job_id.into(),
        })
        .await?;
        self.write(ns, |d| {
            d.dead.retain(|j| !(j.died_at == died_at && j.job.id == job_id))
        });
        Ok(())
    }

    async fn retry_dead_job(&self, ns: &str, died_at: i64, job_id: &str) -> EngineResult<()> {
        self.enter(Call::RetryDeadJob {
            ns: ns.into(),
            died_at,
            job_id: job_id.into(),
        })
        .await?;
        self.write(ns, |d| {
            d.dead.retain(|j| !(j.died_at == died_at && j.job.id == job_id))
        });
        Ok(())
    }

    async fn delete_all_dead_jobs(&self, ns: &str) -> EngineResult<()> {
        self.enter(Call::DeleteAllDeadJobs { ns: ns.into() }).await?;
        self.write(ns, |d| d.dead.clear());
        Ok(())
    }

    async fn retry_all_dead_jobs(&self, ns: &str) -> EngineResult<()> {
        self.enter(Call::RetryAllDeadJobs { ns: ns.into() }).await?;
        self.write(ns, |d| d.dead.clear());
        Ok(())
    }
}

// ---- fixtures ----

pub fn job(name: &str, id: &str, enqueued_at: i64) -> Job {
    Job {
        name: name.to_string(),
        id: id.to_string(),
        enqueued_at,
        args: json!({ "id": id }),
        unique: false,
        fails: 0,
        last_err: None,
        failed_at: None,
    }
}

/// `n` dead jobs `job-1..=job-n`, died_at ascending from [`BASE_DIED_AT`].
pub fn dead_jobs(n: i64) -> Vec<DeadJob> {
    (1..=n)
        .map(|i| DeadJob {
            died_at: BASE_DIED_AT + i,
            job: Job {
                fails: 25,
                last_err: Some("gave up".into()),
                failed_at: Some(BASE_DIED_AT + i),
                ..job("send_email", &format!("job-{i}"), BASE_DIED_AT - 100)
            },
        })
        .collect()
}

pub fn retry_jobs(n: i64) -> Vec<RetryJob> {
    (1..=n)
        .map(|i| RetryJob {
            retry_at: BASE_DIED_AT + i,
            job: job("resize_image", &format!("retry-{i}"), BASE_DIED_AT),
        })
        .collect()
}

pub fn busy(worker_id: &str, job_id: &str) -> WorkerObservation {
    WorkerObservation {
        is_busy: true,
        job_name: Some("send_email".into()),
        job_id: Some(job_id.into()),
        started_at: Some(BASE_DIED_AT),
        args_json: Some("{}".into()),
        ..WorkerObservation::idle(worker_id)
    }
}
