// Worker Backend Port
// Abstraction over how an isolated execution runs one job: an in-process
// handler call or a spawned subprocess.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Job;

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Execution timed out after {0}ms")]
    Timeout(i64),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("No worker bound for kind: {0}")]
    UnboundKind(String),

    #[error("Worker lost before reporting a result: {0}")]
    WorkerLost(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Executes exactly one job to a single terminal outcome.
///
/// Implementations share no mutable state with the dispatcher: the payload
/// goes in, one result or error comes out, and the execution is torn down.
#[async_trait]
pub trait WorkerBackend: Send + Sync {
    async fn execute(&self, job: &Job) -> Result<serde_json::Value, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock backend behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Echo the job payload back as the result
        Echo,
        /// Fail every job with this message
        Fail(String),
        /// Panic with this message (for isolation testing)
        Panic(String),
        /// Sleep this many millis, then echo
        Delay(u64),
        /// Per-job control via the payload: `{"panic": true}` panics,
        /// `{"fail": "msg"}` fails, `{"delay_ms": n}` sleeps then echoes,
        /// anything else echoes
        Scripted,
    }

    /// Mock worker backend for dispatcher tests
    pub struct MockWorkerBackend {
        behavior: Mutex<MockBehavior>,
        executed: Mutex<Vec<serde_json::Value>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockWorkerBackend {
        pub fn new(behavior: MockBehavior) -> Arc<Self> {
            Arc::new(Self {
                behavior: Mutex::new(behavior),
                executed: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        pub fn new_echo() -> Arc<Self> {
            Self::new(MockBehavior::Echo)
        }

        pub fn new_scripted() -> Arc<Self> {
            Self::new(MockBehavior::Scripted)
        }

        /// Total executions observed
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Highest number of executions that were ever in flight at once
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        /// Payloads in the order execution began
        pub fn executed(&self) -> Vec<serde_json::Value> {
            self.executed.lock().unwrap().clone()
        }

        fn track_start(&self, job: &Job) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.executed
                .lock()
                .unwrap()
                .push(job.payload.as_value().clone());
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        }

        fn track_end(&self) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl WorkerBackend for MockWorkerBackend {
        async fn execute(&self, job: &Job) -> Result<serde_json::Value, ExecutionError> {
            self.track_start(job);
            let behavior = self.behavior.lock().unwrap().clone();
            let payload = job.payload.as_value().clone();

            let result = match behavior {
                MockBehavior::Echo => Ok(payload),
                MockBehavior::Fail(msg) => Err(ExecutionError::HandlerFailed(msg)),
                MockBehavior::Panic(msg) => {
                    self.track_end();
                    panic!("{}", msg); // Actually panic for isolation testing
                }
                MockBehavior::Delay(millis) => {
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    Ok(payload)
                }
                MockBehavior::Scripted => {
                    if payload.get("panic").and_then(|v| v.as_bool()) == Some(true) {
                        self.track_end();
                        panic!("scripted panic");
                    }
                    if let Some(msg) = payload.get("fail").and_then(|v| v.as_str()) {
                        Err(ExecutionError::HandlerFailed(msg.to_string()))
                    } else {
                        if let Some(ms) = payload.get("delay_ms").and_then(|v| v.as_u64()) {
                            tokio::time::sleep(Duration::from_millis(ms)).await;
                        }
                        Ok(payload)
                    }
                }
            };

            self.track_end();
            result
        }
    }
}
