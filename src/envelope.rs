//! Wire envelopes - the request/response shapes exchanged over stdio.
//!
//! One envelope per line, encoded as JSON. Payload fields (`Data`, `Result`)
//! carry arbitrary caller/driver JSON that must round-trip byte-for-byte,
//! including number formatting, so they are base64 strings on the wire rather
//! than nested JSON. The `Error` field is a plain human-readable string;
//! absence (or emptiness) of that field is the sole success signal.
//!
//! # Example
//!
//! ```
//! use driverwire::envelope::{Request, Response, METHOD_SCHEMA};
//! use bytes::Bytes;
//!
//! let req = Request::new(METHOD_SCHEMA);
//! let line = req.encode().unwrap();
//! let decoded = Request::decode(&line).unwrap();
//! assert_eq!(decoded, req);
//!
//! let resp = Response::success(Bytes::from_static(b"{}"));
//! let bytes = resp.into_result().unwrap();
//! assert_eq!(&bytes[..], b"{}");
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{DriverWireError, Result};

/// Method name for retrieving a driver's schema.
pub const METHOD_SCHEMA: &str = "driver.schema";

/// Method name for retrieving a driver's usage instruction.
pub const METHOD_INSTRUCTION: &str = "driver.instruction";

/// Method name for reading points from a driver.
pub const METHOD_READ_POINTS: &str = "driver.readPoints";

/// One call across the stdio boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Name of the operation this request targets.
    #[serde(rename = "Method")]
    pub method: String,

    /// Opaque caller-defined payload, base64 on the wire.
    #[serde(
        rename = "Data",
        with = "base64_field",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Bytes>,
}

impl Request {
    /// Create a request with no payload.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            data: None,
        }
    }

    /// Create a request carrying an opaque payload.
    pub fn with_data(method: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            data: Some(data.into()),
        }
    }

    /// Encode this request as one wire line (no trailing newline).
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a request from one wire line.
    ///
    /// # Errors
    ///
    /// Returns error if the line is not a valid request envelope.
    pub fn decode(line: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(line)?)
    }
}

/// One reply across the stdio boundary.
///
/// `result` and `error` are mutually exclusive: a non-empty `error` means the
/// result payload is not meaningful, and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Response {
    /// Opaque result payload, base64 on the wire.
    #[serde(
        rename = "Result",
        with = "base64_field",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Bytes>,

    /// Human-readable error description; absent on success.
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Create a success response carrying a result payload.
    pub fn success(result: impl Into<Bytes>) -> Self {
        Self {
            result: Some(result.into()),
            error: None,
        }
    }

    /// Create an error-tagged response.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }

    /// Encode this response as one wire line (no trailing newline).
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a response from one wire line.
    ///
    /// # Errors
    ///
    /// Returns error if the line is not a valid response envelope.
    pub fn decode(line: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(line)?)
    }

    /// Collapse this response into the caller-facing result.
    ///
    /// A non-empty `error` field yields [`DriverWireError::Driver`] built
    /// from that string; otherwise the result bytes (empty if absent).
    pub fn into_result(self) -> Result<Bytes> {
        match self.error {
            Some(msg) if !msg.is_empty() => Err(DriverWireError::Driver(msg)),
            _ => Ok(self.result.unwrap_or_default()),
        }
    }
}

/// Serde adapter representing `Option<Bytes>` as a base64 string.
mod base64_field {
    use super::{Bytes, BASE64};
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Bytes>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => ser.serialize_str(&BASE64.encode(bytes)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Bytes>, D::Error> {
        let encoded: Option<String> = Option::deserialize(de)?;
        match encoded {
            Some(s) => {
                let decoded = BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom)?;
                Ok(Some(Bytes::from(decoded)))
            }
            None => Ok(None),
        }
    }
}
