//! Turn on MySQL backups for agents that look like database hosts.

use std::sync::Arc;

use regex::Regex;

use cdp_client::models::{DatabaseInstance, DiskSafe, Policy};
use cdp_client::ClientFactory;
use cdp_domain::error::{Error, Result};
use cdp_domain::{ProtocolVersion, ServerDescriptor};

use crate::dispatch::VersionDispatcher;

/// Hostnames of the managed database and telephony hosts.
pub const DEFAULT_HOST_PATTERN: &str = r"mce\d+-db|(?:obp|sip)(?:uk)?[456]-\d+";

/// Credentials the DB add-on uses to reach the local MySQL server.
#[derive(Clone, PartialEq, Eq)]
pub struct MysqlCredentials {
    pub username: String,
    pub password: String,
}

impl MysqlCredentials {
    /// Parse the `user:pass` argument form.
    pub fn parse(arg: &str) -> Result<Self> {
        match arg.split_once(':') {
            Some((user, pass)) if !user.is_empty() => Ok(Self {
                username: user.to_owned(),
                password: pass.to_owned(),
            }),
            _ => Err(Error::Config(format!(
                "expected <mysql user>:<mysql password>, got {arg:?}"
            ))),
        }
    }

    pub fn instance(&self) -> DatabaseInstance {
        DatabaseInstance::local_mysql(&self.username, &self.password)
    }
}

impl std::fmt::Debug for MysqlCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbPluginReport {
    /// Agents whose add-on was switched on.
    pub agents_enabled: Vec<String>,
    /// Policies that received a MySQL instance.
    pub policies_updated: Vec<String>,
    /// `(hostname, error)` for agents that could not be updated.
    pub failures: Vec<(String, String)>,
}

pub struct EnableDbPlugin {
    factory: Arc<dyn ClientFactory>,
    pattern: Regex,
    mysql: MysqlCredentials,
}

impl EnableDbPlugin {
    /// `pattern` must match at the start of an agent's hostname or
    /// description.
    pub fn new(factory: Arc<dyn ClientFactory>, pattern: &str, mysql: MysqlCredentials) -> Result<Self> {
        let pattern = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|e| Error::Config(format!("invalid host pattern: {e}")))?;
        Ok(Self {
            factory,
            pattern,
            mysql,
        })
    }

    pub fn dispatcher(self: Arc<Self>, workers: usize) -> VersionDispatcher<DbPluginReport> {
        VersionDispatcher::new().workers(workers).on(
            &[ProtocolVersion::V3, ProtocolVersion::V4, ProtocolVersion::V5],
            move |s| {
                let op = self.clone();
                async move { op.handle_v3(&s).await }
            },
        )
    }

    fn is_candidate(&self, hostname: &str, description: &str) -> bool {
        self.pattern.is_match(hostname) || self.pattern.is_match(description)
    }

    pub async fn handle_v3(&self, server: &ServerDescriptor) -> Result<DbPluginReport> {
        let client = self.factory.cdp(server)?;
        let agents = client.agents().await?;
        let policies = client.policies().await?;
        let all_agents = agents.get_agents().await?;
        let disk_safes: Vec<DiskSafe> = client.disk_safes().await?.get_disk_safes().await?;
        let all_policies = policies.get_policies().await?;
        let mut report = DbPluginReport::default();

        for mut agent in all_agents {
            tracing::debug!(agent = %agent.hostname, description = %agent.description, "considering agent");
            if !self.is_candidate(&agent.hostname, &agent.description) {
                continue;
            }

            if agent.database_add_on_enabled {
                tracing::info!(agent = %agent.hostname, "db add-on already enabled");
            } else {
                agent.database_add_on_enabled = true;
                match agents.update_agent(&agent).await {
                    Ok(()) => {
                        tracing::info!(agent = %agent.hostname, "enabled db add-on");
                        report.agents_enabled.push(agent.hostname.clone());
                    }
                    Err(e @ Error::Fault { .. }) => {
                        tracing::error!(agent = %agent.hostname, error = %e, "updating agent failed");
                        report.failures.push((agent.hostname.clone(), e.to_string()));
                    }
                    Err(e) => return Err(e),
                }
            }

            let Some(mut policy) = policy_for_agent(&all_policies, &disk_safes, agent.id_str()) else {
                tracing::warn!(agent = %agent.hostname, "no policy protects this agent");
                continue;
            };
            if !policy.database_instances.is_empty() {
                tracing::info!(
                    policy = %policy.name,
                    count = policy.database_instances.len(),
                    "policy already has database instances"
                );
                continue;
            }
            policy.database_instances = vec![self.mysql.instance()];
            policies.update_policy(&policy).await?;
            tracing::info!(policy = %policy.name, "added default MySQL instance");
            report.policies_updated.push(policy.name);
        }
        Ok(report)
    }
}

/// The first policy whose disk safe belongs to `agent_id`.
fn policy_for_agent(policies: &[Policy], disk_safes: &[DiskSafe], agent_id: &str) -> Option<Policy> {
    let owned: Vec<&str> = disk_safes
        .iter()
        .filter(|d| d.agent_id == agent_id)
        .filter_map(|d| d.id.as_deref())
        .collect();
    policies
        .iter()
        .find(|p| p.disk_safe_id.as_deref().is_some_and(|id| owned.contains(&id)))
        .cloned()
}
