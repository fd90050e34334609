//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over TCP on localhost. Job progress is pushed through the
//! `job.subscribe.v1` subscription as `job.event` notifications.

use crate::error::to_rpc_error;
use crate::handler::RpcHandler;
use crate::types::{JobIdRequest, ListJobsRequest};
use futures::StreamExt;
use jsonrpsee::core::SubscriptionResult;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::Params;
use jsonrpsee::{PendingSubscriptionSink, RpcModule, SubscriptionMessage};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};
use verba_core::application::{ProgressPublisher, SubmissionService, SubmitRequest};
use verba_core::error::AppError;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9527;

pub const SUBSCRIBE_METHOD: &str = "job.subscribe.v1";
pub const UNSUBSCRIBE_METHOD: &str = "job.unsubscribe.v1";
pub const EVENT_NOTIFICATION: &str = "job.event";

fn default_host() -> String {
    DEFAULT_RPC_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_RPC_PORT
}

/// RPC Server Configuration (`[rpc]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
    publisher: ProgressPublisher,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        service: Arc<SubmissionService>,
        publisher: ProgressPublisher,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(service)),
            publisher,
        }
    }

    /// Build the method table without binding a socket
    pub fn into_module(self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("job.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SubmitRequest = params.parse()?;
                    handler.submit(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.get.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobIdRequest = params.parse()?;
                    handler.get(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: Option<ListJobsRequest> = params.parse()?;
                    handler.list(req.unwrap_or_default()).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.cancel.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobIdRequest = params.parse()?;
                    handler.cancel(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.remove.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobIdRequest = params.parse()?;
                    handler.remove(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.stats.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.stats().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        let publisher = self.publisher.clone();
        module
            .register_subscription(
                SUBSCRIBE_METHOD,
                EVENT_NOTIFICATION,
                UNSUBSCRIBE_METHOD,
                move |params, pending, _, _| {
                    let handler = handler.clone();
                    let publisher = publisher.clone();
                    async move { forward_events(handler, publisher, params, pending).await }
                },
            )
            .map_err(|e| e.to_string())?;

        Ok(module)
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the handle and the bound address (port 0 picks a free port).
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = self.into_module()?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((handle, local_addr))
    }
}

/// Pipe delivery events for one job into a subscription sink.
///
/// Ends after the terminal event or when the client goes away.
async fn forward_events(
    handler: Arc<RpcHandler>,
    publisher: ProgressPublisher,
    params: Params<'static>,
    pending: PendingSubscriptionSink,
) -> SubscriptionResult {
    let req: JobIdRequest = match params.parse() {
        Ok(req) => req,
        Err(e) => {
            pending.reject(e).await;
            return Ok(());
        }
    };
    if handler.manager().get(&req.job_id).is_none() {
        let err = AppError::NotFound(format!("Job {}", req.job_id));
        pending.reject(to_rpc_error(err)).await;
        return Ok(());
    }

    let sink = pending.accept().await?;
    debug!(job_id = %req.job_id, "Progress subscription opened");
    let events = publisher.subscribe(req.job_id.clone());
    futures::pin_mut!(events);

    loop {
        tokio::select! {
            _ = sink.closed() => break,
            next = events.next() => {
                let Some(event) = next else { break };
                let terminal = event.is_terminal();
                let msg = SubscriptionMessage::from_json(&event)?;
                if sink.send(msg).await.is_err() || terminal {
                    break;
                }
            }
        }
    }
    debug!(job_id = %req.job_id, "Progress subscription closed");
    Ok(())
}
