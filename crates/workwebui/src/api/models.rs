// crates/workwebui/src/api/models.rs
use serde::Serialize;

/// One page of a job set. `count` is the size of the whole set, not the page.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage<T> {
    pub count: i64,
    pub jobs: Vec<T>,
}

/// Fixed acknowledgement for dead-job mutations.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusAck {
    pub status: &'static str,
}

impl StatusAck {
    pub const OK: StatusAck = StatusAck { status: "ok" };
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
