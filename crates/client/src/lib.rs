//! Layered remote client for R1Soft CDP backup servers.
//!
//! ```text
//! CdpClient / LegacyClient
//!   └─ NamespaceClientCache      one handle per namespace, built on first use
//!        └─ NamespaceHandle      Retrier ─▶ RateLimiter ─▶ Transport
//!             └─ SoapTransport | XmlRpcTransport
//! ```

pub mod factory;
pub mod http;
pub mod legacy;
pub mod limiter;
pub mod models;
pub mod namespace;
pub mod retry;
pub mod services;
pub mod soap;
pub mod transport;
pub mod value;
pub mod xml;
pub mod xmlrpc;

#[cfg(feature = "test-support")]
pub mod testing;

pub use factory::{ClientFactory, HttpClientFactory};
pub use legacy::LegacyClient;
pub use namespace::{CallPolicy, NamespaceClientCache, NamespaceHandle};
pub use services::CdpClient;
pub use transport::{Connector, Transport};
pub use value::{Record, Value};
