//! Casework Job Daemon - Main Entry Point
//!
//! Composition root: wires the worker registry, dispatcher, and JSON-RPC
//! server, then drains on shutdown.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use casework_api_rpc::server::RpcServerConfig;
use casework_api_rpc::RpcServer;
use casework_core::application::dispatcher::{JobQueue, DEFAULT_MAX_CONCURRENT};
use casework_core::application::registry::{WorkerRegistry, WorkerTemplate};
use casework_core::domain::JobKind;
use casework_core::port::id_provider::UuidProvider;
use casework_core::port::time_provider::SystemTimeProvider;
use casework_infra_worker::RegistryBackend;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_WORKER_DIR: &str = "~/.casework/workers";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Job kinds bound to subprocess workers at startup. Each kind maps to an
/// executable of the same name under the worker directory.
const WORKER_KINDS: &[&str] = &[
    "fetch_vin",
    "generate_thumbnails",
    "review_profile",
    "send_snail_mail",
];

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (JSON in production, pretty in development)
    let log_format = std::env::var("CASEWORK_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("casework=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Casework job daemon v{} starting...", VERSION);

    // 2. Load configuration
    let rpc_port: u16 = std::env::var("CASEWORK_RPC_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9643);

    let max_concurrent: usize = std::env::var("CASEWORK_MAX_CONCURRENT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_CONCURRENT);

    let worker_dir = std::env::var("CASEWORK_WORKER_DIR")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_WORKER_DIR).into_owned());

    let worker_timeout_ms: Option<i64> = std::env::var("CASEWORK_WORKER_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok());

    // 3. Bind worker templates (fixed for the life of the process)
    let registry = Arc::new(WorkerRegistry::new());
    for kind in WORKER_KINDS {
        let mut template = WorkerTemplate::new(Path::new(&worker_dir).join(kind));
        if let Some(ms) = worker_timeout_ms {
            template = template.timeout_ms(ms);
        }
        registry
            .register_template(JobKind::new(*kind), template)
            .map_err(|e| anyhow::anyhow!("worker binding failed: {}", e))?;
    }
    info!(
        worker_dir = %worker_dir,
        kinds = WORKER_KINDS.len(),
        "Worker templates bound"
    );

    // 4. Build the queue (DI wiring)
    let backend = Arc::new(RegistryBackend::new(registry.clone()));
    let queue = JobQueue::new(
        registry,
        backend,
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        max_concurrent,
    );

    // 5. Start the JSON-RPC server
    let rpc_config = RpcServerConfig {
        port: rpc_port,
        ..Default::default()
    };
    let (rpc_handle, rpc_addr) = RpcServer::new(rpc_config, queue.clone())
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %rpc_addr, max_concurrent, "System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Draining...");

    // 7. Graceful shutdown: stop intake, then let running jobs finish
    queue.close();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;

    if tokio::time::timeout(DRAIN_TIMEOUT, queue.wait_idle())
        .await
        .is_err()
    {
        warn!("Jobs still running after drain timeout; exiting anyway");
    }

    info!("Shutdown complete.");
    Ok(())
}
