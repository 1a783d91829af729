//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP, bound to localhost by default.

use crate::handler::RpcHandler;
use crate::types::{
    DeadLettersRequest, EnqueueRequest, JobRequest, ReindexRequest, StatsRequest, UploadRequest,
};
use ingest_core::application::IngestionService;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9531;

/// RPC Server Configuration
#[derive(Debug, Clone)]
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

pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, service: Arc<IngestionService>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(service)),
        }
    }

    /// Start the JSON-RPC server; the returned handle keeps it alive.
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let module = self.build_module()?;
        Ok(server.start(module))
    }

    fn build_module(&self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("ingest.enqueue.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: EnqueueRequest = params.parse()?;
                    handler.enqueue(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("ingest.upload.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: UploadRequest = params.parse()?;
                    handler.upload(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("ingest.reindex.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ReindexRequest = params.parse()?;
                    handler.reindex(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("ingest.job.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobRequest = params.parse()?;
                    handler.job(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.stats.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    // Allow both `{}` and no params at all
                    let req: StatsRequest = params.parse().unwrap_or(StatsRequest {});
                    handler.stats(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.dead_letters.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: DeadLettersRequest = params.parse()?;
                    handler.dead_letters(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        Ok(module)
    }
}
