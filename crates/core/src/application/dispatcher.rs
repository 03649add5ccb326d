// Dispatcher - priority dispatch with bounded, isolated execution

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::application::events::{EventBus, JobStamp, QueueEvent};
use crate::application::registry::WorkerRegistry;
use crate::domain::{
    DomainError, Job, JobFilter, JobId, JobKind, JobLedger, JobPayload, PendingQueue,
    StatusCounts,
};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TimeProvider, WorkerBackend};

/// Default concurrent execution bound
pub const DEFAULT_MAX_CONCURRENT: usize = 1;

/// Enqueue parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub kind: String,
    pub payload: serde_json::Value,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub case_id: Option<String>,
}

/// The priority job queue and dispatcher.
///
/// One instance per process, created at startup and torn down at shutdown;
/// tests construct fresh instances. Cloning is cheap and shares the queue.
/// Dispatch runs on spawned tasks, so the queue must live inside a tokio
/// runtime.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<DispatchState>,
    registry: Arc<WorkerRegistry>,
    backend: Arc<dyn WorkerBackend>,
    bus: EventBus,
    clock: Arc<dyn TimeProvider>,
    ids: Arc<dyn IdProvider>,
    max_concurrent: usize,
}

/// Queue and ledger state, owned by one mutex so status reads always observe
/// whole records. Nothing awaits while holding it.
struct DispatchState {
    pending: PendingQueue,
    ledger: JobLedger,
    running: usize,
    closed: bool,
}

/// Terminal outcome reported by an execution supervisor
enum Outcome {
    Done(serde_json::Value),
    Error(String),
}

impl JobQueue {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        backend: Arc<dyn WorkerBackend>,
        clock: Arc<dyn TimeProvider>,
        ids: Arc<dyn IdProvider>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(DispatchState {
                    pending: PendingQueue::new(),
                    ledger: JobLedger::new(),
                    running: 0,
                    closed: false,
                }),
                registry,
                backend,
                bus: EventBus::new(),
                clock,
                ids,
                max_concurrent: max_concurrent.max(1),
            }),
        }
    }

    /// Enqueue a unit of work and return its job id.
    ///
    /// An unregistered kind is a configuration error surfaced immediately;
    /// the job is never queued. Never blocks on job execution.
    pub fn enqueue(&self, req: EnqueueRequest) -> Result<JobId> {
        let kind = JobKind::new(req.kind);
        if !self.inner.registry.is_registered(&kind) {
            return Err(AppError::Config(format!(
                "no worker registered for job kind {}",
                kind
            )));
        }

        let job_id = self.inner.ids.generate_id();
        let now = self.inner.clock.now_millis();

        {
            let mut state = self.inner.lock_state();
            if state.closed {
                return Err(AppError::InvalidState("job queue is closed".to_string()));
            }

            let sequence = state.pending.push(job_id.clone(), req.priority);
            let job = Job::new(
                job_id.clone(),
                kind.clone(),
                JobPayload::new(req.payload),
                req.priority,
                sequence,
                req.case_id,
                now,
            );
            let stamp = stamp_of(&job);
            state.ledger.insert(job);
            self.inner.bus.publish(QueueEvent::Enqueued(stamp));
        }

        debug!(job_id = %job_id, kind = %kind, "Job enqueued");
        Inner::schedule_pump(&self.inner);
        Ok(job_id)
    }

    /// Clone out job records, optionally filtered by kind and/or case, in
    /// enqueue order. Live statuses included.
    pub fn list_jobs(&self, filter: &JobFilter) -> Vec<Job> {
        self.inner.lock_state().ledger.list(filter)
    }

    /// Point lookup of a single job record
    pub fn find_job(&self, job_id: &str) -> Option<Job> {
        self.inner.lock_state().ledger.find(job_id)
    }

    /// True while any job for the case is queued or running
    pub fn is_active(&self, case_id: &str) -> bool {
        self.inner.lock_state().ledger.is_active(case_id)
    }

    /// Per-status job totals
    pub fn counts(&self) -> StatusCounts {
        self.inner.lock_state().ledger.counts()
    }

    /// Subscribe to queue lifecycle events (forward delivery only)
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.bus.subscribe()
    }

    /// True when nothing is queued or running
    pub fn is_idle(&self) -> bool {
        let state = self.inner.lock_state();
        state.running == 0 && state.pending.is_empty()
    }

    /// Reject further enqueues. Queued and running jobs drain normally.
    pub fn close(&self) {
        self.inner.lock_state().closed = true;
        info!("Job queue closed to new work");
    }

    /// Resolve when the queue next becomes idle (immediately if it already is)
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.bus.subscribe();
        if self.is_idle() {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(QueueEvent::Idle) => return,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    if self.is_idle() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Wait until a job matching the filter reaches a terminal status and
    /// return its record.
    ///
    /// Subscribes before checking the ledger, so a job that finished just
    /// before the call is still observed; polling races cannot miss the
    /// terminal transition.
    pub async fn wait_for_terminal(
        &self,
        kind: Option<&str>,
        case_id: Option<&str>,
    ) -> Result<Job> {
        let mut rx = self.inner.bus.subscribe();

        if let Some(job) = self.find_terminal(kind, case_id) {
            return Ok(job);
        }

        loop {
            match rx.recv().await {
                Ok(event) if event.is_terminal() => {
                    if let Some(stamp) = event.stamp() {
                        if stamp_matches(stamp, kind, case_id) {
                            if let Some(job) = self.find_job(&stamp.job_id) {
                                return Ok(job);
                            }
                        }
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged; re-checking ledger");
                    if let Some(job) = self.find_terminal(kind, case_id) {
                        return Ok(job);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(AppError::InvalidState(
                        "event bus closed while waiting".to_string(),
                    ));
                }
            }
        }
    }

    fn find_terminal(&self, kind: Option<&str>, case_id: Option<&str>) -> Option<Job> {
        let filter = JobFilter {
            kind: kind.map(JobKind::new),
            case_id: case_id.map(str::to_string),
        };
        self.inner
            .lock_state()
            .ledger
            .list(&filter)
            .into_iter()
            .find(|job| job.status.is_terminal())
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().expect("dispatch state lock poisoned")
    }

    /// Run the pump on its own task, so enqueue returns before any job
    /// starts and a burst of enqueues is fully ordered before dispatch.
    fn schedule_pump(this: &Arc<Self>) {
        let inner = Arc::clone(this);
        tokio::spawn(async move {
            Inner::pump(&inner);
        });
    }

    /// Start executions while capacity remains and work is pending
    fn pump(this: &Arc<Self>) {
        let mut state = this.lock_state();
        while state.running < this.max_concurrent {
            let Some((job_id, _)) = state.pending.pop() else {
                break;
            };

            let now = this.clock.now_millis();
            let job = match state.ledger.get_mut(&job_id) {
                Some(job) => {
                    if let Err(e) = job.start(now) {
                        // The pending queue hands each id out exactly once,
                        // so a non-queued job here is a bug, not a race.
                        error!(job_id = %job_id, error = %e, "Refusing to start job");
                        continue;
                    }
                    job.clone()
                }
                None => {
                    error!(job_id = %job_id, "Pending job missing from ledger");
                    continue;
                }
            };

            state.running += 1;
            this.bus.publish(QueueEvent::Started(stamp_of(&job)));
            info!(job_id = %job.id, kind = %job.kind, "Job started");

            let inner = Arc::clone(this);
            tokio::spawn(async move {
                let outcome = inner.supervise(&job).await;
                Inner::finish(&inner, &job.id, outcome);
            });
        }
    }

    /// Run one job inside its own task and reduce it to a single terminal
    /// outcome. A panicked or aborted execution surfaces as a lost worker,
    /// never as a dispatcher crash.
    async fn supervise(&self, job: &Job) -> Outcome {
        let backend = Arc::clone(&self.backend);
        let isolated = job.clone();
        let handle = tokio::spawn(async move { backend.execute(&isolated).await });

        match handle.await {
            Ok(Ok(result)) => Outcome::Done(result),
            Ok(Err(e)) => Outcome::Error(e.to_string()),
            Err(join_err) => {
                let cause = if join_err.is_panic() {
                    "worker panicked"
                } else {
                    "worker cancelled"
                };
                error!(job_id = %job.id, error = %join_err, "Worker lost");
                Outcome::Error(format!("worker lost before reporting a result: {}", cause))
            }
        }
    }

    /// Record a terminal outcome, free the execution slot, and keep draining
    fn finish(this: &Arc<Self>, job_id: &str, outcome: Outcome) {
        let now = this.clock.now_millis();
        {
            let mut state = this.lock_state();
            state.running = state.running.saturating_sub(1);

            match state.ledger.get_mut(job_id) {
                Some(job) => match apply_outcome(job, outcome, now) {
                    Ok(event) => this.bus.publish(event),
                    Err(e) => {
                        // Supervisors report exactly once per job, so a
                        // rejected terminal transition is unreachable short
                        // of a dispatcher bug.
                        error!(job_id = %job_id, error = %e, "Dropped duplicate terminal outcome");
                    }
                },
                None => error!(job_id = %job_id, "Finished job missing from ledger"),
            }

            if state.running == 0 && state.pending.is_empty() {
                debug!("Queue idle");
                this.bus.publish(QueueEvent::Idle);
            }
        }
        Inner::pump(this);
    }
}

fn apply_outcome(
    job: &mut Job,
    outcome: Outcome,
    now: i64,
) -> std::result::Result<QueueEvent, DomainError> {
    match outcome {
        Outcome::Done(result) => {
            job.complete(result, now)?;
            info!(job_id = %job.id, "Job done");
            Ok(QueueEvent::Done(stamp_of(job)))
        }
        Outcome::Error(message) => {
            job.fail(message.clone(), now)?;
            warn!(job_id = %job.id, error = %message, "Job failed");
            Ok(QueueEvent::Error {
                stamp: stamp_of(job),
                message,
            })
        }
    }
}

fn stamp_of(job: &Job) -> JobStamp {
    JobStamp {
        job_id: job.id.clone(),
        kind: job.kind.clone(),
        case_id: job.case_id.clone(),
    }
}

fn stamp_matches(stamp: &JobStamp, kind: Option<&str>, case_id: Option<&str>) -> bool {
    kind.map_or(true, |k| stamp.kind.as_str() == k)
        && case_id.map_or(true, |c| stamp.case_id.as_deref() == Some(c))
}
