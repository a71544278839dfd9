//! Error types for driverwire.

use thiserror::Error;

/// Main error type for all driverwire operations.
#[derive(Debug, Error)]
pub enum DriverWireError {
    /// I/O error during pipe/process operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON envelope serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The driver's output stream closed cleanly before a full line arrived.
    #[error("driver stream closed")]
    StreamClosed,

    /// A handler is already registered for this method.
    #[error("handler already exists for this method")]
    HandlerExists,

    /// No handler is registered for the requested method.
    #[error("method not found")]
    MethodNotFound,

    /// A handler did not complete within the request timeout.
    #[error("handler timed out")]
    HandlerTimeout,

    /// Error reported by the driver in a response envelope.
    #[error("{0}")]
    Driver(String),

    /// The requested controller is not known to the point store.
    #[error("controller not found")]
    ControllerNotFound,

    /// The requested point is not known to the controller.
    #[error("point not found")]
    PointNotFound,
}

/// Result type alias using DriverWireError.
pub type Result<T> = std::result::Result<T, DriverWireError>;
