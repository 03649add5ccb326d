// Queue Lifecycle Events

use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::{CaseId, JobId, JobKind};

/// Buffered events per subscriber before the oldest are dropped
const EVENT_BUFFER: usize = 256;

/// Correlation info carried on every per-job event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStamp {
    pub job_id: JobId,
    pub kind: JobKind,
    pub case_id: Option<CaseId>,
}

/// Queue-level lifecycle event.
///
/// Per job, in order: `Enqueued`, `Started`, then exactly one of
/// `Done`/`Error`. `Idle` fires whenever running plus queued reaches zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    Enqueued(JobStamp),
    Started(JobStamp),
    Done(JobStamp),
    Error { stamp: JobStamp, message: String },
    Idle,
}

impl QueueEvent {
    /// Stamp of the job this event concerns; None for Idle
    pub fn stamp(&self) -> Option<&JobStamp> {
        match self {
            QueueEvent::Enqueued(stamp)
            | QueueEvent::Started(stamp)
            | QueueEvent::Done(stamp) => Some(stamp),
            QueueEvent::Error { stamp, .. } => Some(stamp),
            QueueEvent::Idle => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueEvent::Done(_) | QueueEvent::Error { .. })
    }
}

/// Broadcast-based publish/subscribe bus.
///
/// Forward delivery only: a subscriber sees events published after it
/// subscribed, there is no replay. Dropping the receiver unsubscribes.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<QueueEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUFFER)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. An event with no subscriber is
    /// dropped, not an error.
    pub fn publish(&self, event: QueueEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
