// Registry-routing worker backend

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use casework_core::application::registry::{WorkerBinding, WorkerRegistry};
use casework_core::domain::Job;
use casework_core::port::{ExecutionError, WorkerBackend};

use crate::subprocess::SubprocessWorker;

/// Resolves the binding for a job's kind and executes it: in-process handlers
/// run on the calling task, subprocess templates spawn a one-shot child
/// process.
pub struct RegistryBackend {
    registry: Arc<WorkerRegistry>,
    subprocess: SubprocessWorker,
}

impl RegistryBackend {
    pub fn new(registry: Arc<WorkerRegistry>) -> Self {
        Self {
            registry,
            subprocess: SubprocessWorker::default(),
        }
    }

    /// Override the environment allowlist passed to worker subprocesses
    pub fn with_env_allowlist(registry: Arc<WorkerRegistry>, allowlist: Vec<String>) -> Self {
        Self {
            registry,
            subprocess: SubprocessWorker::new(allowlist),
        }
    }
}

#[async_trait]
impl WorkerBackend for RegistryBackend {
    async fn execute(&self, job: &Job) -> Result<serde_json::Value, ExecutionError> {
        let binding = self
            .registry
            .resolve(&job.kind)
            .ok_or_else(|| ExecutionError::UnboundKind(job.kind.to_string()))?;

        match binding {
            WorkerBinding::Handler(handler) => {
                debug!(job_id = %job.id, kind = %job.kind, "Running in-process handler");
                handler
                    .run(&job.payload)
                    .await
                    .map_err(|e| ExecutionError::HandlerFailed(e.to_string()))
            }
            WorkerBinding::Template(template) => {
                debug!(
                    job_id = %job.id,
                    kind = %job.kind,
                    program = %template.program.display(),
                    "Spawning worker subprocess"
                );
                self.subprocess.run(&template, &job.payload).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_core::domain::{JobKind, JobPayload};
    use casework_core::port::{handler_fn, HandlerError};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Deserialize)]
    struct MailRequest {
        address: String,
    }

    #[derive(Serialize)]
    struct MailReceipt {
        accepted: bool,
        address: String,
    }

    fn job_of(kind: &str, payload: serde_json::Value) -> Job {
        Job::new(
            "job-1",
            JobKind::new(kind),
            JobPayload::new(payload),
            0,
            1,
            None,
            1000,
        )
    }

    #[tokio::test]
    async fn routes_to_in_process_handler() {
        let registry = Arc::new(WorkerRegistry::new());
        registry
            .register_handler(
                JobKind::new("send_snail_mail"),
                handler_fn(|req: MailRequest| async move {
                    Ok::<_, HandlerError>(MailReceipt {
                        accepted: true,
                        address: req.address,
                    })
                }),
            )
            .unwrap();

        let backend = RegistryBackend::new(registry);
        let job = job_of("send_snail_mail", json!({"address": "12 Elm St"}));

        let result = backend.execute(&job).await.unwrap();
        assert_eq!(result, json!({"accepted": true, "address": "12 Elm St"}));
    }

    #[tokio::test]
    async fn unbound_kind_is_an_execution_error() {
        let registry = Arc::new(WorkerRegistry::new());
        let backend = RegistryBackend::new(registry);
        let job = job_of("generate_thumbnails", json!({}));

        let err = backend.execute(&job).await.unwrap_err();
        assert!(matches!(err, ExecutionError::UnboundKind(_)));
    }

    #[tokio::test]
    async fn handler_errors_carry_the_message() {
        let registry = Arc::new(WorkerRegistry::new());
        registry
            .register_handler(
                JobKind::new("review_profile"),
                handler_fn(|_req: serde_json::Value| async move {
                    Err::<serde_json::Value, _>(HandlerError::new("scoring service 503"))
                }),
            )
            .unwrap();

        let backend = RegistryBackend::new(registry);
        let job = job_of("review_profile", json!({"profile_id": 7}));

        let err = backend.execute(&job).await.unwrap_err();
        assert!(err.to_string().contains("scoring service 503"));
    }
}
