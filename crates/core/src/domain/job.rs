// Job Domain Model

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};

/// Job ID (UUID v4, injected via IdProvider)
pub type JobId = String;

/// Case association. Carried for status filtering only, never interpreted
/// by the queue itself.
pub type CaseId = String;

/// Priority (higher number dequeues first)
pub type Priority = i32;

/// Enqueue sequence number. Strictly increasing, never reused; the sole
/// tie-breaker between jobs of equal priority.
pub type Sequence = u64;

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// Job kind, selects the registered worker binding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKind(String);

impl JobKind {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job payload (JSON). Opaque to the queue; handlers decode it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Decode into a handler's request type
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_value(self.0.clone())
    }
}

/// Job Entity
///
/// Status moves forward only: Queued -> Running -> Done or Error. The
/// terminal transition sets exactly one of `result`/`error`; afterwards the
/// record is read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub payload: JobPayload,
    pub priority: Priority,
    pub sequence: Sequence,
    pub case_id: Option<CaseId>,

    pub status: JobStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,

    pub enqueued_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl Job {
    /// Create a new queued job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `kind` - Job kind
    /// * `payload` - Job payload
    /// * `priority` - Dispatch priority
    /// * `sequence` - Enqueue sequence (injected by the pending queue)
    /// * `case_id` - Optional case association
    /// * `enqueued_at` - Enqueue timestamp in epoch ms (injected, not system time)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        kind: JobKind,
        payload: JobPayload,
        priority: Priority,
        sequence: Sequence,
        case_id: Option<CaseId>,
        enqueued_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            payload,
            priority,
            sequence,
            case_id,
            status: JobStatus::Queued,
            result: None,
            error: None,
            enqueued_at,
            started_at: None,
            finished_at: None,
        }
    }

    /// Transition to Running with explicit timestamp
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Queued {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "running".to_string(),
            });
        }
        self.status = JobStatus::Running;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Done with explicit timestamp, recording the result
    pub fn complete(&mut self, result: serde_json::Value, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "done".to_string(),
            });
        }
        self.status = JobStatus::Done;
        self.result = Some(result);
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Error with explicit timestamp, recording the message
    pub fn fail(&mut self, message: impl Into<String>, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "error".to_string(),
            });
        }
        self.status = JobStatus::Error;
        self.error = Some(message.into());
        self.finished_at = Some(now_millis);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn queued_job() -> Job {
        Job::new(
            "job-1",
            JobKind::new("fetch_vin"),
            JobPayload::new(json!({"vin": "1FTFW1ET5DFC10312"})),
            0,
            1,
            Some("case-1".to_string()),
            1000,
        )
    }

    #[test]
    fn new_job_is_queued() {
        let job = queued_job();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.result.is_none());
        assert!(job.error.is_none());
        assert!(job.started_at.is_none());
    }

    #[test]
    fn full_lifecycle_done() {
        let mut job = queued_job();
        job.start(2000).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.started_at, Some(2000));

        job.complete(json!({"make": "Ford"}), 3000).unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.finished_at, Some(3000));
        assert!(job.result.is_some());
        assert!(job.error.is_none());
    }

    #[test]
    fn full_lifecycle_error() {
        let mut job = queued_job();
        job.start(2000).unwrap();
        job.fail("decoder unavailable", 3000).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("decoder unavailable"));
        assert!(job.result.is_none());
    }

    #[test]
    fn cannot_complete_without_running() {
        let mut job = queued_job();
        let err = job.complete(json!(null), 2000).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn cannot_fail_a_queued_job() {
        let mut job = queued_job();
        assert!(job.fail("boom", 2000).is_err());
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn terminal_status_is_final() {
        let mut job = queued_job();
        job.start(2000).unwrap();
        job.complete(json!(1), 3000).unwrap();

        assert!(job.start(4000).is_err());
        assert!(job.complete(json!(2), 4000).is_err());
        assert!(job.fail("late", 4000).is_err());
        assert_eq!(job.result, Some(json!(1)));
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
