use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Depth of one job queue inside a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub job_name: String,
    pub count: i64,
    /// Seconds since the oldest queued job was enqueued.
    pub latency: i64,
}

/// Liveness record a worker pool writes periodically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerPoolHeartbeat {
    pub worker_pool_id: String,
    pub started_at: i64,
    pub heartbeat_at: i64,
    pub job_names: Vec<String>,
    pub concurrency: i64,
    pub host: String,
    pub pid: i64,
    pub worker_ids: Vec<String>,
}

/// What a single worker is doing right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerObservation {
    pub worker_id: String,
    pub is_busy: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkin_at: Option<i64>,
}

impl WorkerObservation {
    pub fn idle(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            is_busy: false,
            job_name: None,
            job_id: None,
            started_at: None,
            args_json: None,
            checkin: None,
            checkin_at: None,
        }
    }
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Engine-held job state as exposed to the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub id: String,
    #[serde(rename = "t")]
    pub enqueued_at: i64,
    pub args: Value,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub fails: i64,
    #[serde(rename = "err", default, skip_serializing_if = "Option::is_none")]
    pub last_err: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryJob {
    pub retry_at: i64,
    #[serde(flatten)]
    pub job: Job,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub run_at: i64,
    #[serde(flatten)]
    pub job: Job,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadJob {
    pub died_at: i64,
    #[serde(flatten)]
    pub job: Job,
}

/// Composite address of one dead job inside a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeadJobKey {
    pub died_at: i64,
    pub job_id: String,
}

impl DeadJobKey {
    pub fn new(died_at: i64, job_id: impl Into<String>) -> Self {
        Self {
            died_at,
            job_id: job_id.into(),
        }
    }
}

impl DeadJob {
    pub fn key(&self) -> DeadJobKey {
        DeadJobKey::new(self.died_at, self.job.id.clone())
    }
}
