// Job Ledger - in-process catalogue of every job this process has accepted

use std::collections::HashMap;

use serde::Serialize;

use super::job::{CaseId, Job, JobKind, JobStatus};

/// Ledger query filter; omitted fields select all
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub kind: Option<JobKind>,
    pub case_id: Option<CaseId>,
}

/// Per-status job totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: u64,
    pub running: u64,
    pub done: u64,
    pub error: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.queued + self.running + self.done + self.error
    }
}

/// Insertion-ordered catalogue of job records.
///
/// Records live until process exit. Mutation goes through the dispatcher;
/// queries clone records out, so readers always observe a whole record.
#[derive(Debug, Default)]
pub struct JobLedger {
    jobs: HashMap<String, Job>,
    order: Vec<String>,
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly enqueued job. Ids are unique by construction.
    pub fn insert(&mut self, job: Job) {
        self.order.push(job.id.clone());
        self.jobs.insert(job.id.clone(), job);
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.get_mut(id)
    }

    /// Clone out a single record
    pub fn find(&self, id: &str) -> Option<Job> {
        self.jobs.get(id).cloned()
    }

    /// Clone out all records matching the filter, in enqueue order
    pub fn list(&self, filter: &JobFilter) -> Vec<Job> {
        self.order
            .iter()
            .filter_map(|id| self.jobs.get(id))
            .filter(|job| {
                filter.kind.as_ref().map_or(true, |k| &job.kind == k)
                    && filter
                        .case_id
                        .as_ref()
                        .map_or(true, |c| job.case_id.as_ref() == Some(c))
            })
            .cloned()
            .collect()
    }

    /// True while any job for the case is queued or running
    pub fn is_active(&self, case_id: &str) -> bool {
        self.jobs.values().any(|job| {
            job.case_id.as_deref() == Some(case_id) && !job.status.is_terminal()
        })
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for job in self.jobs.values() {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Done => counts.done += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
