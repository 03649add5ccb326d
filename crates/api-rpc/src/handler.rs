//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method against a shared
//! [`JobQueue`].

use jsonrpsee::types::ErrorObjectOwned;

use casework_core::application::dispatcher::{EnqueueRequest, JobQueue};
use casework_core::domain::{JobFilter, JobKind};
use casework_core::error::AppError;

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    ActiveParams, ActiveResponse, EnqueueParams, EnqueueResponse, GetParams, JobSummary,
    ListParams, ListResponse, StatsResponse,
};

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    queue: JobQueue,
    rate_limiter: RateLimiter,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(queue: JobQueue) -> Self {
        // Default: 200 burst, 100 req/sec (configurable via env)
        let max_burst: u32 = std::env::var("CASEWORK_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);

        let rate_per_sec: u32 = std::env::var("CASEWORK_RATE_LIMIT_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        Self {
            queue,
            rate_limiter: RateLimiter::new(max_burst, rate_per_sec),
            start_time: std::time::Instant::now(),
        }
    }

    /// jobs.enqueue.v1
    pub async fn enqueue(
        &self,
        params: EnqueueParams,
    ) -> Result<EnqueueResponse, ErrorObjectOwned> {
        if !self.rate_limiter.check().await {
            return Err(throttled());
        }

        let job_id = self
            .queue
            .enqueue(EnqueueRequest {
                kind: params.kind,
                payload: params.payload,
                priority: params.priority,
                case_id: params.case_id,
            })
            .map_err(to_rpc_error)?;

        Ok(EnqueueResponse {
            job_id,
            status: casework_core::domain::JobStatus::Queued,
        })
    }

    /// jobs.list.v1
    pub async fn list(&self, params: ListParams) -> Result<ListResponse, ErrorObjectOwned> {
        let filter = JobFilter {
            kind: params.kind.map(JobKind::new),
            case_id: params.case_id,
        };

        let jobs = self
            .queue
            .list_jobs(&filter)
            .into_iter()
            .map(JobSummary::from)
            .collect();

        Ok(ListResponse { jobs })
    }

    /// jobs.get.v1
    pub async fn get(&self, params: GetParams) -> Result<JobSummary, ErrorObjectOwned> {
        self.queue
            .find_job(&params.job_id)
            .map(JobSummary::from)
            .ok_or_else(|| {
                to_rpc_error(AppError::NotFound(format!(
                    "Job {} not found",
                    params.job_id
                )))
            })
    }

    /// cases.active.v1
    pub async fn case_active(
        &self,
        params: ActiveParams,
    ) -> Result<ActiveResponse, ErrorObjectOwned> {
        let active = self.queue.is_active(&params.case_id);
        Ok(ActiveResponse {
            case_id: params.case_id,
            active,
        })
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> Result<StatsResponse, ErrorObjectOwned> {
        let counts = self.queue.counts();
        Ok(StatsResponse {
            queued: counts.queued,
            running: counts.running,
            done: counts.done,
            error: counts.error,
            total: counts.total(),
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }
}
