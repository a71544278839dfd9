//! # driverwire
//!
//! Stdio driver RPC: a host process invokes pluggable hardware-protocol
//! drivers without linking against them, by running each driver as a
//! long-lived subprocess and exchanging line-delimited JSON envelopes over
//! its standard input and output streams.
//!
//! ## Architecture
//!
//! - **Host side**: [`StdioClient`] builds typed calls (schema, instruction,
//!   read points) and [`CommandExecutor`] keeps one subprocess per driver,
//!   serializing the line exchange per process.
//! - **Driver side**: [`DriverServer`] reads envelopes from stdin, dispatches
//!   to registered handlers with a per-request timeout, and writes envelopes
//!   to stdout through a single writer task.
//!
//! The protocol carries no request identifier, so the executor allows
//! exactly one in-flight call per driver process; that exclusion is what
//! keeps responses attributable.
//!
//! ## Example
//!
//! A driver process:
//!
//! ```ignore
//! use bytes::Bytes;
//! use driverwire::{envelope::METHOD_SCHEMA, DriverServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> driverwire::Result<()> {
//!     let mut server = DriverServer::new();
//!     server.add_handler(METHOD_SCHEMA, |_data: Bytes| async move {
//!         Ok(Bytes::from_static(b"{}"))
//!     })?;
//!
//!     server
//!         .listen(tokio::io::stdin(), tokio::io::stdout(), CancellationToken::new())
//!         .await
//! }
//! ```
//!
//! The host side:
//!
//! ```ignore
//! use std::sync::Arc;
//! use driverwire::{CommandExecutor, StdioClient};
//!
//! let executor = Arc::new(CommandExecutor::new("/usr/lib/drivers"));
//! let client = StdioClient::new(executor);
//! let schema = client.schema("example").await?;
//! ```

pub mod client;
pub mod controller;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod handler;
pub mod point;
pub mod server;

mod writer;

pub use client::{StdioClient, TOOL_SUFFIX};
pub use error::{DriverWireError, Result};
pub use executor::{CallbackExecutor, CommandExecutor, Executor};
pub use handler::{Handler, HandlerRegistry};
pub use point::PointValue;
pub use server::{DriverServer, ServerConfig};
