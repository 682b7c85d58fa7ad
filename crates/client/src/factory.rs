//! Client construction seam used by the operation handlers.

use cdp_domain::error::Result;
use cdp_domain::settings::ClientSettings;
use cdp_domain::ServerDescriptor;

use crate::legacy::LegacyClient;
use crate::services::CdpClient;

/// Builds a fresh client per server. Clients are never shared between
/// servers, so every client owns its own namespace cache.
pub trait ClientFactory: Send + Sync {
    fn cdp(&self, server: &ServerDescriptor) -> Result<CdpClient>;
    fn legacy(&self, server: &ServerDescriptor) -> Result<LegacyClient>;
}

/// Factory for real SOAP and XML-RPC clients.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    settings: ClientSettings,
}

impl HttpClientFactory {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }
}

impl ClientFactory for HttpClientFactory {
    fn cdp(&self, server: &ServerDescriptor) -> Result<CdpClient> {
        CdpClient::connect(server, &self.settings)
    }

    fn legacy(&self, server: &ServerDescriptor) -> Result<LegacyClient> {
        LegacyClient::connect(server, &self.settings)
    }
}
