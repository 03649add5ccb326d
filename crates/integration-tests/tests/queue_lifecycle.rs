//! End-to-end queue lifecycle over real in-process handlers

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use casework_core::application::dispatcher::{EnqueueRequest, JobQueue};
use casework_core::application::registry::WorkerRegistry;
use casework_core::domain::{JobFilter, JobKind, JobStatus};
use casework_core::port::id_provider::UuidProvider;
use casework_core::port::time_provider::SystemTimeProvider;
use casework_core::port::{handler_fn, HandlerError};
use casework_infra_worker::RegistryBackend;

#[derive(Deserialize)]
struct VinLookup {
    vin: String,
}

#[derive(Serialize)]
struct VinDetails {
    vin: String,
    make: String,
}

/// Builds a queue whose fetch_vin handler records the order payloads arrive
fn queue_with_recorder(max_concurrent: usize) -> (JobQueue, Arc<Mutex<Vec<i64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let registry = Arc::new(WorkerRegistry::new());

    let recorder = Arc::clone(&seen);
    registry
        .register_handler(
            JobKind::new("fetch_vin"),
            handler_fn(move |req: serde_json::Value| {
                let recorder = Arc::clone(&recorder);
                async move {
                    if let Some(n) = req.get("n").and_then(|v| v.as_i64()) {
                        recorder.lock().unwrap().push(n);
                    }
                    if req.get("panic").and_then(|v| v.as_bool()) == Some(true) {
                        panic!("handler blew up");
                    }
                    if let Some(ms) = req.get("delay_ms").and_then(|v| v.as_u64()) {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                    }
                    Ok::<_, HandlerError>(req)
                }
            }),
        )
        .unwrap();

    registry
        .register_handler(
            JobKind::new("review_profile"),
            handler_fn(|req: serde_json::Value| async move { Ok::<_, HandlerError>(req) }),
        )
        .unwrap();

    let backend = Arc::new(RegistryBackend::new(registry.clone()));
    let queue = JobQueue::new(
        registry,
        backend,
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        max_concurrent,
    );
    (queue, seen)
}

fn enqueue(queue: &JobQueue, kind: &str, payload: serde_json::Value, priority: i32, case: Option<&str>) -> String {
    queue
        .enqueue(EnqueueRequest {
            kind: kind.to_string(),
            payload,
            priority,
            case_id: case.map(str::to_string),
        })
        .unwrap()
}

#[tokio::test]
async fn priority_order_drives_execution() {
    let (queue, seen) = queue_with_recorder(1);

    enqueue(&queue, "fetch_vin", json!({"n": 1}), 0, None);
    enqueue(&queue, "fetch_vin", json!({"n": 2}), 1, None);
    enqueue(&queue, "fetch_vin", json!({"n": 3}), 1, None);
    enqueue(&queue, "fetch_vin", json!({"n": 4}), 2, None);

    queue.wait_idle().await;

    assert_eq!(*seen.lock().unwrap(), vec![4, 2, 3, 1]);
}

#[tokio::test]
async fn typed_handlers_produce_typed_results() {
    let registry = Arc::new(WorkerRegistry::new());
    registry
        .register_handler(
            JobKind::new("fetch_vin"),
            handler_fn(|req: VinLookup| async move {
                if req.vin.len() != 17 {
                    return Err(HandlerError::new(format!("malformed VIN: {}", req.vin)));
                }
                Ok(VinDetails {
                    vin: req.vin,
                    make: "Ford".to_string(),
                })
            }),
        )
        .unwrap();

    let backend = Arc::new(RegistryBackend::new(registry.clone()));
    let queue = JobQueue::new(
        registry,
        backend,
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        1,
    );

    let ok = enqueue(
        &queue,
        "fetch_vin",
        json!({"vin": "1FTFW1ET5DFC10312"}),
        0,
        Some("case-7"),
    );
    let malformed = enqueue(&queue, "fetch_vin", json!({"vin": "SHORT"}), 0, Some("case-7"));
    let undecodable = enqueue(&queue, "fetch_vin", json!({"plate": "ABC123"}), 0, None);

    queue.wait_idle().await;

    let ok = queue.find_job(&ok).unwrap();
    assert_eq!(ok.status, JobStatus::Done);
    assert_eq!(
        ok.result,
        Some(json!({"vin": "1FTFW1ET5DFC10312", "make": "Ford"}))
    );

    let malformed = queue.find_job(&malformed).unwrap();
    assert_eq!(malformed.status, JobStatus::Error);
    assert!(malformed.error.as_deref().unwrap().contains("malformed VIN"));

    let undecodable = queue.find_job(&undecodable).unwrap();
    assert_eq!(undecodable.status, JobStatus::Error);
    assert!(undecodable
        .error
        .as_deref()
        .unwrap()
        .contains("invalid payload"));
}

#[tokio::test]
async fn panicking_handler_does_not_take_down_the_queue() {
    let (queue, seen) = queue_with_recorder(1);

    enqueue(&queue, "fetch_vin", json!({"n": 1, "panic": true}), 1, Some("c1"));
    enqueue(&queue, "fetch_vin", json!({"n": 2}), 0, Some("c2"));

    queue.wait_idle().await;

    let jobs = queue.list_jobs(&JobFilter::default());
    assert_eq!(jobs.len(), 2);

    let crashed = &jobs[0];
    assert_eq!(crashed.status, JobStatus::Error);
    assert!(crashed.error.as_deref().unwrap().contains("worker lost"));

    let fine = &jobs[1];
    assert_eq!(fine.status, JobStatus::Done);

    // Both handlers actually ran
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn case_activity_and_filtering() {
    let (queue, _) = queue_with_recorder(1);

    enqueue(&queue, "fetch_vin", json!({"delay_ms": 30}), 0, Some("c1"));
    enqueue(&queue, "review_profile", json!({"profile": 9}), 0, Some("c1"));
    enqueue(&queue, "fetch_vin", json!({}), 0, Some("c2"));

    assert!(queue.is_active("c1"));
    assert!(queue.is_active("c2"));

    queue.wait_idle().await;

    assert!(!queue.is_active("c1"));
    assert!(!queue.is_active("c2"));

    let c1_jobs = queue.list_jobs(&JobFilter {
        kind: None,
        case_id: Some("c1".to_string()),
    });
    assert_eq!(c1_jobs.len(), 2);
    assert_eq!(c1_jobs[0].kind.as_str(), "fetch_vin");
    assert_eq!(c1_jobs[1].kind.as_str(), "review_profile");

    let vin_jobs = queue.list_jobs(&JobFilter {
        kind: Some(JobKind::new("fetch_vin")),
        case_id: None,
    });
    assert_eq!(vin_jobs.len(), 2);

    let counts = queue.counts();
    assert_eq!(counts.done, 3);
    assert_eq!(counts.queued + counts.running, 0);
}

#[tokio::test]
async fn wait_for_terminal_replaces_status_polling() {
    let (queue, _) = queue_with_recorder(2);

    enqueue(&queue, "fetch_vin", json!({"delay_ms": 20}), 0, Some("c5"));

    let job = queue
        .wait_for_terminal(Some("fetch_vin"), Some("c5"))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert!(!queue.is_active("c5"));
}
