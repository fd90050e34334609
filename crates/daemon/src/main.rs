//! Verba daemon - composition root
//!
//! Wires the job engine to the pipeline adapter and both network boundaries
//! (JSON-RPC and HTTP/SSE), then runs until Ctrl+C.

mod config;
mod logging;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use config::DaemonConfig;
use verba_api_rpc::RpcServer;
use verba_api_sse::SseState;
use verba_core::application::worker::shutdown_channel;
use verba_core::application::{JobManager, ProgressPublisher, SubmissionService, WorkerPool};
use verba_core::port::{SystemTimeProvider, UuidProvider, WorkFactory};
use verba_infra_system::CommandWorkFactory;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const HTTP_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    let _log_guard = logging::init()?;
    info!("Verba daemon v{} starting...", VERSION);

    // 2. Configuration
    let config = DaemonConfig::load()?;
    let output_dir = config.output_dir();
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create output dir {}", output_dir.display()))?;

    let pipelines = config.pipeline_map()?;
    if pipelines.is_empty() {
        warn!("No [pipelines] configured; every submission will be rejected as invalid");
    }
    info!(
        output_dir = %output_dir.display(),
        workers = config.pool.workers,
        queue_capacity = config.pool.queue_capacity,
        pipelines = pipelines.len(),
        "Configuration loaded"
    );

    // 3. Engine wiring
    let pool = WorkerPool::start(config.pool);
    let manager = Arc::new(JobManager::new(
        pool,
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        config.jobs.log_capacity,
    ));
    let factory: Arc<dyn WorkFactory> = Arc::new(CommandWorkFactory::new(pipelines, output_dir));
    let service = Arc::new(SubmissionService::new(Arc::clone(&manager), factory));
    let publisher =
        ProgressPublisher::with_poll_interval(Arc::clone(&manager), config.jobs.poll_interval());

    // 4. JSON-RPC server
    let (rpc_handle, rpc_addr) = RpcServer::new(config.rpc.clone(), service, publisher.clone())
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;
    info!(addr = %rpc_addr, "JSON-RPC ready");

    // 5. HTTP/SSE server
    let (stop_tx, mut stop_token) = shutdown_channel();
    let http_config = config.http.clone();
    let sse_state = SseState::new(Arc::clone(&manager), publisher);
    let http_handle = tokio::spawn(async move {
        let shutdown = async move { stop_token.wait().await };
        if let Err(e) = verba_api_sse::serve(&http_config, sse_state, shutdown).await {
            tracing::error!(error = %e, "HTTP/SSE server failed");
        }
    });

    info!("System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: stop intake, then drain running jobs
    stop_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    manager.shutdown(config.jobs.shutdown_grace()).await;
    if tokio::time::timeout(HTTP_STOP_TIMEOUT, http_handle).await.is_err() {
        warn!("HTTP/SSE server did not stop in time");
    }

    let counts = manager.counts();
    info!(
        completed = counts.completed,
        failed = counts.failed,
        cancelled = counts.cancelled,
        "Shutdown complete."
    );
    telemetry::shutdown();

    Ok(())
}
