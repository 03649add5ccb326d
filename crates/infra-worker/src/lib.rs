// Casework Infrastructure - Worker Backends
// Implements: WorkerBackend over registry bindings (in-process + subprocess)

pub mod registry_backend;
pub mod subprocess;

pub use registry_backend::RegistryBackend;
pub use subprocess::SubprocessWorker;
