//! Seams between the layered client and the wire.
//!
//! A [`Connector`] builds one [`Transport`] per service namespace. The
//! namespace cache owns the connector and wraps every transport it builds
//! with rate limiting and retry.

use std::sync::Arc;

use async_trait::async_trait;

use cdp_domain::error::Result;

use crate::value::{Record, Value};

/// One live client bound to a single service namespace.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invoke `operation` with named parameters.
    ///
    /// Parameter order is preserved; positional protocols (XML-RPC) ignore
    /// the names.
    async fn call(&self, operation: &str, params: &Record) -> Result<Value>;
}

/// Factory for namespace transports of one server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Label of the server this connector targets, for logs.
    fn server(&self) -> &str;

    /// Construct a transport for `namespace`.
    ///
    /// Failures here (unreachable host, rejected credentials, unreadable
    /// service description) are never retried by the caller.
    async fn connect(&self, namespace: &str) -> Result<Arc<dyn Transport>>;
}
