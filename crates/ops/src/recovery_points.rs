//! Bring every policy's recovery-point limit to a common value.

use std::sync::Arc;

use cdp_client::ClientFactory;
use cdp_domain::error::Result;
use cdp_domain::{ProtocolVersion, ServerDescriptor};

use crate::dispatch::VersionDispatcher;

pub struct UpdateRecoveryPoints {
    factory: Arc<dyn ClientFactory>,
    limit: i64,
}

impl UpdateRecoveryPoints {
    pub fn new(factory: Arc<dyn ClientFactory>, limit: i64) -> Self {
        Self { factory, limit }
    }

    pub fn dispatcher(self: Arc<Self>, workers: usize) -> VersionDispatcher<Vec<String>> {
        VersionDispatcher::new().workers(workers).on(
            &[ProtocolVersion::V3, ProtocolVersion::V4, ProtocolVersion::V5],
            move |s| {
                let op = self.clone();
                async move { op.handle_v3(&s).await }
            },
        )
    }

    /// Returns the names of the policies that were changed.
    pub async fn handle_v3(&self, server: &ServerDescriptor) -> Result<Vec<String>> {
        let service = self.factory.cdp(server)?.policies().await?;
        let mut updated = Vec::new();
        for mut policy in service.get_policies().await? {
            if policy.recovery_point_limit == Some(self.limit) {
                continue;
            }
            tracing::info!(
                policy = %policy.name,
                from = ?policy.recovery_point_limit,
                to = self.limit,
                "updating recovery point limit"
            );
            policy.recovery_point_limit = Some(self.limit);
            service.update_policy(&policy).await?;
            updated.push(policy.name);
        }
        Ok(updated)
    }
}
