//! Driver server - the request loop a driver process runs.
//!
//! The server reads request envelopes line by line from its input stream,
//! dispatches each to the registered handler on its own task, and writes
//! response envelopes to its output stream. Reads are strictly sequential;
//! handling is concurrent; writes are serialized by the dedicated writer
//! task (see [`crate::writer`]), so a slow handler never blocks the loop and
//! responses never interleave on the wire.
//!
//! Per-request handling is bounded by [`ServerConfig::request_timeout`]. The
//! timeout is applied with `tokio::time::timeout`, which drops the handler
//! future at its next await point - cancellation is cooperative, never a
//! mid-poll preemption - and the caller still receives a well-formed
//! error-tagged response.
//!
//! A clean end-of-stream on the input is transient by default: the loop waits
//! [`ServerConfig::eof_retry_interval`] and retries, honoring the shutdown
//! token between attempts. Set [`ServerConfig::max_eof_retries`] to treat a
//! permanently closed stream as termination instead of spinning forever.
//!
//! # Example
//!
//! ```ignore
//! use driverwire::server::DriverServer;
//! use bytes::Bytes;
//! use tokio_util::sync::CancellationToken;
//!
//! let mut server = DriverServer::new();
//! server.add_handler("driver.schema", |_data: Bytes| async move {
//!     Ok(Bytes::from_static(b"{}"))
//! })?;
//!
//! let shutdown = CancellationToken::new();
//! server.listen(tokio::io::stdin(), tokio::io::stdout(), shutdown).await?;
//! ```

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio_util::sync::CancellationToken;

use crate::envelope::{Request, Response};
use crate::error::{DriverWireError, Result};
use crate::handler::{Handler, HandlerRegistry};
use crate::writer::spawn_response_writer;

/// Default per-request handler timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait before retrying a read after a clean end-of-stream.
pub const DEFAULT_EOF_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the driver server loop.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Deadline for a single handler invocation.
    pub request_timeout: Duration,
    /// Wait between read attempts after a clean end-of-stream.
    pub eof_retry_interval: Duration,
    /// Consecutive clean end-of-stream reads after which the loop stops.
    /// `None` retries indefinitely.
    pub max_eof_retries: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            eof_retry_interval: DEFAULT_EOF_RETRY_INTERVAL,
            max_eof_retries: None,
        }
    }
}

/// Server that answers driver calls arriving on an input stream.
pub struct DriverServer {
    registry: HandlerRegistry,
    config: ServerConfig,
}

impl DriverServer {
    /// Create a server with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a server with the given configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config,
        }
    }

    /// Register a handler for a method name.
    ///
    /// # Errors
    ///
    /// Returns [`DriverWireError::HandlerExists`] if the method is already
    /// registered; the existing handler is untouched.
    pub fn add_handler<H: Handler>(&mut self, method: &str, handler: H) -> Result<()> {
        self.registry.add(method, handler)
    }

    /// Run the request loop until the shutdown token fires.
    ///
    /// Consumes the server; the registry is immutable from here on. Returns
    /// once the token is cancelled (or the EOF retry budget is exhausted) and
    /// every queued response has been flushed.
    ///
    /// # Errors
    ///
    /// Returns error if the response writer fails on the output stream.
    pub async fn listen<R, W>(self, input: R, output: W, shutdown: CancellationToken) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let DriverServer { registry, config } = self;
        let registry = Arc::new(registry);

        let (responses, writer_task) = spawn_response_writer(output);

        let mut reader = BufReader::new(input);
        let mut line = String::new();
        let mut eof_streak: u32 = 0;

        loop {
            line.clear();
            let read = tokio::select! {
                _ = shutdown.cancelled() => break,
                read = reader.read_line(&mut line) => read,
            };

            match read {
                // Clean end-of-stream: transient unless the retry budget says
                // otherwise. Wait and retry, unless shutdown fires first.
                Ok(0) => {
                    eof_streak += 1;
                    if let Some(max) = config.max_eof_retries {
                        if eof_streak >= max {
                            tracing::debug!(
                                retries = eof_streak,
                                "input stream closed permanently, stopping"
                            );
                            break;
                        }
                    }

                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(config.eof_retry_interval) => {}
                    }
                }

                Ok(_) => {
                    eof_streak = 0;

                    let trimmed = line.trim_end_matches(|c| c == '\n' || c == '\r');
                    if trimmed.is_empty() {
                        continue;
                    }

                    match Request::decode(trimmed.as_bytes()) {
                        Ok(request) => {
                            dispatch(&registry, request, &config, &responses).await;
                        }
                        // Malformed envelope: no method context, report and
                        // keep serving.
                        Err(err) => {
                            tracing::debug!(error = %err, "failed to decode request");
                            let _ = responses.send(Response::failure(err.to_string())).await;
                        }
                    }
                }

                Err(err) => {
                    tracing::debug!(error = %err, "failed to read request line");
                    let _ = responses.send(Response::failure(err.to_string())).await;
                }
            }
        }

        drop(responses);
        writer_task
            .await
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?
    }
}

impl Default for DriverServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Hand one decoded request to its handler on an independent task.
async fn dispatch(
    registry: &Arc<HandlerRegistry>,
    request: Request,
    config: &ServerConfig,
    responses: &tokio::sync::mpsc::Sender<Response>,
) {
    let handler = match registry.get(&request.method) {
        Some(handler) => handler,
        None => {
            tracing::debug!(method = %request.method, "method not found");
            let response = Response::failure(DriverWireError::MethodNotFound.to_string());
            let _ = responses.send(response).await;
            return;
        }
    };

    let method = request.method;
    let data = request.data.unwrap_or_default();
    let timeout = config.request_timeout;
    let responses = responses.clone();

    tokio::spawn(async move {
        let response = match tokio::time::timeout(timeout, handler.call(data)).await {
            Ok(Ok(result)) => Response::success(result),
            Ok(Err(err)) => {
                tracing::debug!(method = %method, error = %err, "handler failed");
                Response::failure(err.to_string())
            }
            Err(_) => {
                tracing::warn!(method = %method, timeout = ?timeout, "handler timed out");
                Response::failure(DriverWireError::HandlerTimeout.to_string())
            }
        };

        if responses.send(response).await.is_err() {
            tracing::error!(method = %method, "response writer is gone, dropping response");
        }
    });
}
