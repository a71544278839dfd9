//! Demo driver process.
//!
//! Serves the three driver operations over stdin/stdout against the
//! in-memory demo controller. Logs go to stderr only - stdout is the
//! protocol channel.
//!
//! Run under a host's drivers directory as `example_tool`; the host reaches
//! it as driver `example`.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use driverwire::controller::{DemoTool, ReadPointsRequest};
use driverwire::envelope::{METHOD_INSTRUCTION, METHOD_READ_POINTS, METHOD_SCHEMA};
use driverwire::{DriverServer, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let tool = Arc::new(DemoTool::new());

    let mut server = DriverServer::new();

    {
        let tool = Arc::clone(&tool);
        server.add_handler(METHOD_SCHEMA, move |_data: Bytes| {
            let tool = Arc::clone(&tool);
            async move { tool.schema() }
        })?;
    }

    {
        let tool = Arc::clone(&tool);
        server.add_handler(METHOD_INSTRUCTION, move |_data: Bytes| {
            let tool = Arc::clone(&tool);
            async move { Ok(Bytes::from(tool.instruction())) }
        })?;
    }

    {
        let tool = Arc::clone(&tool);
        server.add_handler(METHOD_READ_POINTS, move |data: Bytes| {
            let tool = Arc::clone(&tool);
            async move {
                let request: ReadPointsRequest = serde_json::from_slice(&data)?;
                let values = tool.read_points(&request)?;
                Ok(Bytes::from(serde_json::to_vec(&values)?))
            }
        })?;
    }

    let shutdown = CancellationToken::new();

    let listener = tokio::spawn(server.listen(
        tokio::io::stdin(),
        tokio::io::stdout(),
        shutdown.clone(),
    ));

    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    shutdown.cancel();

    match listener.await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(error = %err, "server task failed");
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(err) => {
            tracing::error!(error = %err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
