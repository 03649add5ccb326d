//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use serde::{Deserialize, Serialize};

use casework_core::domain::{Job, JobStatus};

/// jobs.enqueue.v1 - Enqueue a job
#[derive(Debug, Deserialize)]
pub struct EnqueueParams {
    pub kind: String,
    pub payload: serde_json::Value,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub case_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// jobs.list.v1 - List jobs by kind and/or case
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub case_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub jobs: Vec<JobSummary>,
}

/// jobs.get.v1 - Fetch one job record
#[derive(Debug, Deserialize)]
pub struct GetParams {
    pub job_id: String,
}

/// cases.active.v1 - Is work still in flight for a case
#[derive(Debug, Deserialize)]
pub struct ActiveParams {
    pub case_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveResponse {
    pub case_id: String,
    pub active: bool,
}

/// admin.stats.v1 - Queue totals
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub queued: u64,
    pub running: u64,
    pub done: u64,
    pub error: u64,
    pub total: u64,
    pub uptime_seconds: i64,
}

/// Status-poll view of a job. The payload stays internal; callers see the
/// terminal result or error only.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub kind: String,
    pub status: JobStatus,
    pub priority: i32,
    pub case_id: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub enqueued_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            kind: job.kind.as_str().to_string(),
            status: job.status,
            priority: job.priority,
            case_id: job.case_id,
            result: job.result,
            error: job.error,
            enqueued_at: job.enqueued_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}
