//! End-to-end dispatch through subprocess worker templates

use std::sync::Arc;

use serde_json::json;

use casework_core::application::dispatcher::{EnqueueRequest, JobQueue};
use casework_core::application::registry::{WorkerRegistry, WorkerTemplate};
use casework_core::domain::{JobKind, JobStatus};
use casework_core::port::id_provider::UuidProvider;
use casework_core::port::time_provider::SystemTimeProvider;
use casework_infra_worker::RegistryBackend;

fn shell_template(script: &str) -> WorkerTemplate {
    WorkerTemplate::new("/bin/sh").arg("-c").arg(script)
}

fn queue_with_templates(bindings: Vec<(&str, WorkerTemplate)>) -> JobQueue {
    let registry = Arc::new(WorkerRegistry::new());
    for (kind, template) in bindings {
        registry
            .register_template(JobKind::new(kind), template)
            .unwrap();
    }
    let backend = Arc::new(RegistryBackend::new(registry.clone()));
    JobQueue::new(
        registry,
        backend,
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        1,
    )
}

fn enqueue(queue: &JobQueue, kind: &str, payload: serde_json::Value) -> String {
    queue
        .enqueue(EnqueueRequest {
            kind: kind.to_string(),
            payload,
            priority: 0,
            case_id: Some("case-sub".to_string()),
        })
        .unwrap()
}

#[tokio::test]
async fn template_worker_reports_its_stdout_as_result() {
    // The fetch_vin worker echoes the payload it was handed on stdin
    let queue = queue_with_templates(vec![("fetch_vin", shell_template("cat"))]);

    let job_id = enqueue(&queue, "fetch_vin", json!({"vin": "1FTFW1ET5DFC10312"}));
    let job = queue.wait_for_terminal(Some("fetch_vin"), None).await.unwrap();

    assert_eq!(job.id, job_id);
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.result, Some(json!({"vin": "1FTFW1ET5DFC10312"})));
}

#[tokio::test]
async fn failing_worker_records_its_stderr() {
    let queue = queue_with_templates(vec![(
        "review_profile",
        shell_template("cat > /dev/null; echo 'classifier unreachable' >&2; exit 7"),
    )]);

    enqueue(&queue, "review_profile", json!({"profile": 3}));
    let job = queue
        .wait_for_terminal(Some("review_profile"), None)
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Error);
    let message = job.error.as_deref().unwrap();
    assert!(message.contains("classifier unreachable"), "{}", message);
    assert!(job.result.is_none());
}

#[tokio::test]
async fn stuck_worker_is_killed_at_the_template_deadline() {
    let queue = queue_with_templates(vec![(
        "generate_thumbnails",
        shell_template("sleep 30").timeout_ms(100),
    )]);

    enqueue(&queue, "generate_thumbnails", json!({"image": "a.jpg"}));
    let job = queue
        .wait_for_terminal(Some("generate_thumbnails"), None)
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn queue_keeps_draining_after_a_worker_failure() {
    let queue = queue_with_templates(vec![
        ("fetch_vin", shell_template("cat")),
        ("send_snail_mail", shell_template("cat > /dev/null; exit 1")),
    ]);

    let broken = enqueue(&queue, "send_snail_mail", json!({"address": "12 Elm St"}));
    let healthy = enqueue(&queue, "fetch_vin", json!({"vin": "2T1BURHE0JC014321"}));

    queue.wait_idle().await;

    assert_eq!(queue.find_job(&broken).unwrap().status, JobStatus::Error);
    assert_eq!(queue.find_job(&healthy).unwrap().status, JobStatus::Done);
}
