// Worker Registry - binds job kinds to worker bindings

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::domain::JobKind;
use crate::error::{AppError, Result};
use crate::port::JobHandler;

/// Subprocess worker template: a fixed program invocation that receives the
/// job payload on stdin and reports its result on stdout.
#[derive(Debug, Clone)]
pub struct WorkerTemplate {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Per-execution deadline; None runs unbounded
    pub timeout_ms: Option<i64>,
}

impl WorkerTemplate {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_ms: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn timeout_ms(mut self, millis: i64) -> Self {
        self.timeout_ms = Some(millis);
        self
    }
}

/// Active binding for a job kind
#[derive(Clone)]
pub enum WorkerBinding {
    /// In-process handler
    Handler(Arc<dyn JobHandler>),
    /// One-shot subprocess invocation
    Template(WorkerTemplate),
}

/// Registry of worker bindings, one active binding per kind.
///
/// Policy: in-process handlers may be re-registered and the last registration
/// wins; template bindings are fixed at startup, so binding a kind that is
/// already taken by a template (or replacing anything with a template) is a
/// conflict.
#[derive(Default)]
pub struct WorkerRegistry {
    bindings: RwLock<HashMap<JobKind, WorkerBinding>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an in-process handler. Replaces any previous handler for the
    /// kind; a kind already fixed to a template is not replaceable.
    pub fn register_handler(
        &self,
        kind: JobKind,
        handler: Arc<dyn JobHandler>,
    ) -> Result<()> {
        let mut bindings = self.lock_write();
        if let Some(WorkerBinding::Template(_)) = bindings.get(&kind) {
            return Err(AppError::Conflict(format!(
                "kind {} is fixed to a worker template",
                kind
            )));
        }
        if bindings
            .insert(kind.clone(), WorkerBinding::Handler(handler))
            .is_some()
        {
            debug!(kind = %kind, "Replaced worker handler");
        }
        Ok(())
    }

    /// Bind a subprocess template. Templates are fixed at startup; binding a
    /// kind that already has any binding is rejected.
    pub fn register_template(&self, kind: JobKind, template: WorkerTemplate) -> Result<()> {
        let mut bindings = self.lock_write();
        if bindings.contains_key(&kind) {
            return Err(AppError::Conflict(format!(
                "worker already bound for kind {}",
                kind
            )));
        }
        bindings.insert(kind, WorkerBinding::Template(template));
        Ok(())
    }

    /// Resolve the active binding for a kind
    pub fn resolve(&self, kind: &JobKind) -> Option<WorkerBinding> {
        self.lock_read().get(kind).cloned()
    }

    pub fn is_registered(&self, kind: &JobKind) -> bool {
        self.lock_read().contains_key(kind)
    }

    /// All currently bound kinds (unordered)
    pub fn kinds(&self) -> Vec<JobKind> {
        self.lock_read().keys().cloned().collect()
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<JobKind, WorkerBinding>> {
        self.bindings.read().expect("worker registry lock poisoned")
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<JobKind, WorkerBinding>> {
        self.bindings
            .write()
            .expect("worker registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{handler_fn, HandlerError};
    use serde_json::Value;

    fn echo_handler(tag: &'static str) -> Arc<dyn JobHandler> {
        handler_fn(move |_req: Value| async move {
            Ok::<_, HandlerError>(serde_json::json!({ "tag": tag }))
        })
    }

    #[tokio::test]
    async fn last_handler_registration_wins() {
        let registry = WorkerRegistry::new();
        let kind = JobKind::new("review_profile");

        registry
            .register_handler(kind.clone(), echo_handler("first"))
            .unwrap();
        registry
            .register_handler(kind.clone(), echo_handler("second"))
            .unwrap();

        let Some(WorkerBinding::Handler(handler)) = registry.resolve(&kind) else {
            panic!("expected a handler binding");
        };
        let result = handler
            .run(&crate::domain::JobPayload::new(serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(result["tag"], "second");
    }

    #[test]
    fn template_binding_is_fixed() {
        let registry = WorkerRegistry::new();
        let kind = JobKind::new("send_snail_mail");

        registry
            .register_template(kind.clone(), WorkerTemplate::new("/usr/local/bin/mailer"))
            .unwrap();

        let again = registry.register_template(kind.clone(), WorkerTemplate::new("/other"));
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let as_handler = registry.register_handler(kind, echo_handler("late"));
        assert!(matches!(as_handler, Err(AppError::Conflict(_))));
    }

    #[test]
    fn unknown_kind_is_unregistered() {
        let registry = WorkerRegistry::new();
        assert!(!registry.is_registered(&JobKind::new("nope")));
        assert!(registry.resolve(&JobKind::new("nope")).is_none());
    }

    #[test]
    fn template_builder() {
        let template = WorkerTemplate::new("/bin/worker")
            .arg("--mode")
            .arg("thumbnails")
            .timeout_ms(30_000);
        assert_eq!(template.args, vec!["--mode", "thumbnails"]);
        assert_eq!(template.timeout_ms, Some(30_000));
    }
}
