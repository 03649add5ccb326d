//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 surface for the Casework job engine: the
//! internal/administrative status and enqueue methods.

pub mod error;
pub mod handler;
mod rate_limiter;
pub mod server;
pub mod types;

pub use server::RpcServer;
