// Application Layer - dispatch logic and queue services

pub mod dispatcher;
pub mod events;
pub mod registry;

// Re-exports
pub use dispatcher::{EnqueueRequest, JobQueue, DEFAULT_MAX_CONCURRENT};
pub use events::{EventBus, JobStamp, QueueEvent};
pub use registry::{WorkerBinding, WorkerRegistry, WorkerTemplate};
