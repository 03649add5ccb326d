//! JSON-RPC Server
//!
//! Serves the job-engine methods over TCP on localhost only; external access
//! stays behind whatever HTTP layer fronts this daemon.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use tracing::info;

use casework_core::application::dispatcher::JobQueue;

use crate::handler::RpcHandler;
use crate::types::{ActiveParams, EnqueueParams, GetParams, ListParams};

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9643;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, queue: JobQueue) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(queue)),
        }
    }

    /// Start the JSON-RPC server.
    ///
    /// Returns the server handle and the bound address; port 0 resolves to
    /// the picked port, which tests rely on.
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("jobs.enqueue.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: EnqueueParams = params.parse()?;
                    handler.enqueue(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("jobs.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ListParams = params.parse().unwrap_or_default();
                    handler.list(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("jobs.get.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: GetParams = params.parse()?;
                    handler.get(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("cases.active.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ActiveParams = params.parse()?;
                    handler.case_active(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.stats.v1", move |_params, _, _| {
                let handler = handler.clone();
                async move { handler.stats().await }
            })
            .map_err(|e| e.to_string())?;

        info!(addr = %local_addr, "JSON-RPC server started");

        let handle = server.start(module);
        Ok((handle, local_addr))
    }
}
