//! Driver client - typed calls on top of an [`Executor`].
//!
//! Builds one request envelope per operation, hands the encoded line to the
//! executor, decodes the single response line and maps it to a typed result
//! or error. The program identity is derived from the driver name by
//! appending [`TOOL_SUFFIX`]: driver `modbus` runs as executable
//! `modbus_tool` under the executor's drivers directory.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use driverwire::{CommandExecutor, StdioClient};
//!
//! let executor = Arc::new(CommandExecutor::new("/usr/lib/drivers"));
//! let client = StdioClient::new(executor);
//!
//! let schema = client.schema("modbus").await?;
//! let points = client.read_points("modbus", br#"{"points":[]}"#).await?;
//! ```

use std::io;
use std::sync::Arc;

use bytes::Bytes;

use crate::envelope::{Request, Response, METHOD_INSTRUCTION, METHOD_READ_POINTS, METHOD_SCHEMA};
use crate::error::Result;
use crate::executor::Executor;
use crate::point::PointValue;

/// Suffix joining a driver name to its executable name.
pub const TOOL_SUFFIX: &str = "_tool";

/// Client issuing driver calls through an executor.
pub struct StdioClient {
    executor: Arc<dyn Executor>,
}

impl StdioClient {
    /// Create a client on top of the given executor.
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Retrieve the driver's schema as raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns the driver-reported error, or a transport/protocol error.
    pub async fn schema(&self, driver: &str) -> Result<Bytes> {
        self.call(driver, Request::new(METHOD_SCHEMA)).await
    }

    /// Retrieve the driver's usage instruction text.
    ///
    /// # Errors
    ///
    /// Returns the driver-reported error, or a transport/protocol error.
    pub async fn instruction(&self, driver: &str) -> Result<String> {
        let result = self.call(driver, Request::new(METHOD_INSTRUCTION)).await?;

        String::from_utf8(result.to_vec()).map_err(|err| {
            io::Error::new(io::ErrorKind::InvalidData, err).into()
        })
    }

    /// Read points from the driver.
    ///
    /// `raw` is the caller-supplied JSON request document, passed through
    /// opaque. The returned values keep the order of the points in the
    /// request.
    ///
    /// # Errors
    ///
    /// Returns the driver-reported error, or a transport/protocol error.
    pub async fn read_points(&self, driver: &str, raw: &[u8]) -> Result<Vec<PointValue>> {
        let request = Request::with_data(METHOD_READ_POINTS, raw.to_vec());
        let result = self.call(driver, request).await?;

        Ok(serde_json::from_slice(&result)?)
    }

    async fn call(&self, driver: &str, request: Request) -> Result<Bytes> {
        let program = format!("{driver}{TOOL_SUFFIX}");

        tracing::debug!(driver, method = %request.method, "calling driver");

        let line = request.encode()?;
        let output = self.executor.execute(&program, &line).await?;

        Response::decode(&output)?.into_result()
    }
}
