// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_handler;
pub mod time_provider;
pub mod worker_backend;

// Re-exports
pub use id_provider::IdProvider;
pub use job_handler::{handler_fn, HandlerError, HandlerResult, JobHandler};
pub use time_provider::TimeProvider;
pub use worker_backend::{ExecutionError, WorkerBackend};
