//! Inventory of which backup server protects which host.

use std::sync::Arc;

use cdp_client::ClientFactory;
use cdp_domain::error::Result;
use cdp_domain::{ProtocolVersion, ServerDescriptor};

use crate::dispatch::VersionDispatcher;

/// One protected host as seen by its backup server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLocation {
    pub hostname: String,
    pub description: String,
    /// Operating system, upper-cased.
    pub host_type: String,
    /// Whether backups are actually scheduled.
    pub active: bool,
    pub mysql_module: bool,
}

pub struct Locations {
    factory: Arc<dyn ClientFactory>,
}

impl Locations {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self { factory }
    }

    pub fn dispatcher(self: Arc<Self>, workers: usize) -> VersionDispatcher<Vec<AgentLocation>> {
        let (v2, soap) = (self.clone(), self);
        VersionDispatcher::new()
            .workers(workers)
            .on(&[ProtocolVersion::V2], move |s| {
                let op = v2.clone();
                async move { op.handle_v2(&s).await }
            })
            .on(
                &[ProtocolVersion::V3, ProtocolVersion::V4, ProtocolVersion::V5],
                move |s| {
                    let op = soap.clone();
                    async move { op.handle_v3(&s).await }
                },
            )
    }

    pub async fn handle_v2(&self, server: &ServerDescriptor) -> Result<Vec<AgentLocation>> {
        let client = self.factory.legacy(server)?;
        let hosts = client.hosts().await?;
        let tasks = client.backup_tasks().await?;
        let mut out = Vec::new();

        for host_id in hosts.get_host_ids().await? {
            let host = hosts.get_host_as_map(&host_id).await?;
            let active = host.enabled
                && tasks
                    .summaries_for_host(&host.host_id)
                    .await?
                    .iter()
                    .any(|t| t.is_active_backup());
            out.push(AgentLocation {
                hostname: host.hostname,
                description: host.description,
                host_type: host.host_type,
                active,
                mysql_module: host.mysql_addon_enabled,
            });
        }
        Ok(out)
    }

    pub async fn handle_v3(&self, server: &ServerDescriptor) -> Result<Vec<AgentLocation>> {
        let client = self.factory.cdp(server)?;
        let policies = client.policies().await?.get_policies().await?;
        let disk_safes = client.disk_safes().await?;
        let agents = client.agents().await?;
        let mut out = Vec::new();

        for policy in policies {
            let Some(disk_safe_id) = policy.disk_safe_id.as_deref() else {
                continue;
            };
            let disk_safe = disk_safes.get_disk_safe_by_id(disk_safe_id).await?;
            let agent = agents.get_agent_by_id(&disk_safe.agent_id).await?;
            out.push(AgentLocation {
                mysql_module: agent.database_add_on_enabled && !policy.database_instances.is_empty(),
                hostname: agent.hostname,
                description: agent.description,
                host_type: agent.os_type.unwrap_or_default().to_uppercase(),
                active: policy.enabled,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use cdp_client::testing::ScriptedFactory;
    use cdp_client::{Record, Value};

    use super::*;

    #[tokio::test]
    async fn v3_joins_policy_disk_safe_and_agent() {
        let factory = ScriptedFactory::new();
        factory
            .server("cdp-a")
            .on(
                "Policy2",
                "getPolicies",
                Value::List(vec![
                    Record::new()
                        .with("name", "web1")
                        .with("enabled", "true")
                        .with("diskSafeID", "ds-1")
                        .with("databaseInstanceList", Record::new().with("name", "default"))
                        .into(),
                    // Orphaned policy without a disk safe.
                    Record::new().with("name", "ghost").with("enabled", "true").into(),
                ]),
            )
            .on(
                "DiskSafe",
                "getDiskSafeByID",
                Record::new().with("id", "ds-1").with("agentID", "a-1"),
            )
            .on(
                "Agent",
                "getAgentByID",
                Record::new()
                    .with("id", "a-1")
                    .with("hostname", "web1.example.com")
                    .with("description", "web one")
                    .with("osType", "Linux")
                    .with("databaseAddOnEnabled", "true"),
            );
        let server = ServerDescriptor::with_default_port(ProtocolVersion::V5, "cdp-a", true, "u", "p");

        let found = Locations::new(Arc::new(factory)).handle_v3(&server).await.unwrap();
        assert_eq!(
            found,
            [AgentLocation {
                hostname: "web1.example.com".into(),
                description: "web one".into(),
                host_type: "LINUX".into(),
                active: true,
                mysql_module: true,
            }]
        );
    }

    #[tokio::test]
    async fn v2_disabled_host_is_inactive() {
        let factory = ScriptedFactory::new();
        factory
            .server("cdp-old")
            .on("host", "getHostIds", Value::List(vec![Value::Int(3)]))
            .on(
                "host",
                "getHostAsMap",
                Record::new()
                    .with("hostID", Value::Int(3))
                    .with("hostname", "old3")
                    .with("hostType", Value::Int(0))
                    .with("enabled", false),
            );
        let server = ServerDescriptor::with_default_port(ProtocolVersion::V2, "cdp-old", true, "u", "p");

        let found = Locations::new(Arc::new(factory)).handle_v2(&server).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(!found[0].active);
        assert_eq!(found[0].host_type, "LINUX");
    }
}
