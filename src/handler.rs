//! Handler registry for dispatching requests by method name.
//!
//! A driver process answers incoming calls through handlers registered here.
//! Registration is write-once per method name: the registry is populated at
//! driver startup and never mutated afterwards, so a duplicate registration
//! is rejected without disturbing the first handler.
//!
//! # Example
//!
//! ```
//! use driverwire::handler::HandlerRegistry;
//! use bytes::Bytes;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry
//!     .add("driver.schema", |_data: Bytes| async move {
//!         Ok(Bytes::from_static(b"{}"))
//!     })
//!     .unwrap();
//!
//! assert!(registry.get("driver.schema").is_some());
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{DriverWireError, Result};

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handler functions.
///
/// A handler receives the request's opaque payload bytes and returns the
/// result payload, or an error whose message travels back on the wire.
pub trait Handler: Send + Sync + 'static {
    /// Handle a request with raw payload bytes.
    fn call(&self, data: Bytes) -> BoxFuture<'static, Result<Bytes>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes>> + Send + 'static,
{
    fn call(&self, data: Bytes) -> BoxFuture<'static, Result<Bytes>> {
        Box::pin((self)(data))
    }
}

/// Registry mapping method names to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a method name.
    ///
    /// # Errors
    ///
    /// Returns [`DriverWireError::HandlerExists`] if the method name is
    /// already registered; the existing handler is left in place.
    pub fn add<H: Handler>(&mut self, method: &str, handler: H) -> Result<()> {
        if self.handlers.contains_key(method) {
            return Err(DriverWireError::HandlerExists);
        }

        self.handlers.insert(method.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Get the handler registered for a method name.
    pub fn get(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
