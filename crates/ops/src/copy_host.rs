//! Move the backup configuration of every host from one server to another.
//!
//! For each policy on the source, the agent, its disk safe and the policy
//! are recreated on the destination, and the source policy is disabled.
//! Agents the destination already knows are skipped.

use cdp_client::models::{
    Agent, DiskSafe, Policy, Volume, ATTR_CONTROL_PANELS, ATTR_DATABASE_BACKUPS,
};
use cdp_client::CdpClient;
use cdp_domain::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Also copy hosts whose policy is disabled.
    pub include_disabled: bool,
    /// Keep the database add-on, its disk safe attribute and DB instances.
    pub include_db_plugin: bool,
    /// Keep control panel instances and the disk safe attribute.
    pub include_cp_plugin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedHost {
    pub hostname: String,
    pub agent_id: String,
    pub disk_safe_id: String,
    pub policy_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: Vec<CopiedHost>,
    /// Hostnames already present on the destination.
    pub skipped: Vec<String>,
}

pub struct CopyHost {
    options: CopyOptions,
}

fn lookup<'a, T>(items: &'a [T], id: &str, what: &str, key: impl Fn(&T) -> Option<&str>) -> Result<&'a T> {
    items
        .iter()
        .find(|item| key(item) == Some(id))
        .ok_or_else(|| Error::NotFound(format!("{what} {id}")))
}

impl CopyHost {
    pub fn new(options: CopyOptions) -> Self {
        Self { options }
    }

    pub async fn run(&self, src: &CdpClient, dest: &CdpClient) -> Result<CopyReport> {
        tracing::info!(src = %src.hostname(), dest = %dest.hostname(), "copying hosts");
        let src_agents = src.agents().await?.get_agents().await?;
        let src_disk_safes = src.disk_safes().await?.get_disk_safes().await?;
        let src_policy_service = src.policies().await?;
        let src_policies = src_policy_service.get_policies().await?;

        let dest_agent_service = dest.agents().await?;
        let dest_disk_safe_service = dest.disk_safes().await?;
        let dest_policy_service = dest.policies().await?;
        let dest_hostnames: Vec<String> = dest_agent_service
            .get_agents()
            .await?
            .into_iter()
            .map(|a| a.hostname)
            .collect();
        let volume: Volume = dest
            .volumes()
            .await?
            .get_volumes()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("volume on {}", dest.hostname())))?;
        tracing::debug!(volume = %volume.id, "using destination volume");

        let mut report = CopyReport::default();
        for src_policy in src_policies {
            if !self.options.include_disabled && !src_policy.enabled {
                tracing::debug!(policy = %src_policy.name, "skipping disabled policy");
                continue;
            }
            let Some(disk_safe_id) = src_policy.disk_safe_id.as_deref() else {
                tracing::debug!(policy = %src_policy.name, "policy has no disk safe, skipping");
                continue;
            };
            let src_disk_safe = lookup(&src_disk_safes, disk_safe_id, "disk safe", |d: &DiskSafe| {
                d.id.as_deref()
            })?;
            let src_agent = lookup(&src_agents, &src_disk_safe.agent_id, "agent", |a: &Agent| {
                a.id.as_deref()
            })?;
            if dest_hostnames.contains(&src_agent.hostname) {
                tracing::warn!(agent = %src_agent.hostname, "agent already copied, skipping");
                report.skipped.push(src_agent.hostname.clone());
                continue;
            }
            let src_policy_id = src_policy.id.clone();
            tracing::info!(
                policy = ?src_policy_id,
                disk_safe = ?src_disk_safe.id,
                agent = ?src_agent.id,
                "copying host"
            );

            let agent = dest_agent_service
                .create_agent_with_object(&self.agent_copy(src_agent))
                .await?;
            tracing::info!(agent = %agent.hostname, id = %agent.id_str(), "copied agent");

            let disk_safe = dest_disk_safe_service
                .create_disk_safe_with_object(&self.disk_safe_copy(src_disk_safe, agent.id_str(), &volume.id))
                .await?;
            let disk_safe_id = disk_safe.id.clone().unwrap_or_default();
            tracing::info!(disk_safe = %disk_safe.description, id = %disk_safe_id, "copied disk safe");

            let policy = dest_policy_service
                .create_policy(&self.policy_copy(&src_policy, &disk_safe_id))
                .await?;
            tracing::info!(policy = %policy.description, id = ?policy.id, "copied policy");

            if src_policy.enabled {
                if let Some(id) = src_policy_id.as_deref() {
                    let current = src_policy_service.get_policy_by_id(id).await?;
                    src_policy_service.disable_policy(&current).await?;
                    tracing::info!(policy = %id, "disabled source policy");
                }
            }

            report.copied.push(CopiedHost {
                hostname: agent.hostname.clone(),
                agent_id: agent.id_str().to_owned(),
                disk_safe_id,
                policy_id: policy.id.unwrap_or_default(),
            });
        }
        Ok(report)
    }

    fn agent_copy(&self, src: &Agent) -> Agent {
        let mut agent = src.clone();
        agent.id = None;
        if !self.options.include_db_plugin && agent.database_add_on_enabled {
            tracing::info!(agent = %agent.hostname, "disabling db add-on on copy");
            agent.database_add_on_enabled = false;
        }
        agent
    }

    fn disk_safe_copy(&self, src: &DiskSafe, agent_id: &str, volume_id: &str) -> DiskSafe {
        let mut disk_safe = src.clone();
        disk_safe.id = None;
        disk_safe.path = None;
        disk_safe.volume_id = Some(volume_id.to_owned());
        disk_safe.agent_id = agent_id.to_owned();
        if !self.options.include_db_plugin {
            disk_safe.set_attribute(ATTR_DATABASE_BACKUPS, "false");
        }
        if !self.options.include_cp_plugin {
            disk_safe.set_attribute(ATTR_CONTROL_PANELS, "false");
        }
        disk_safe
    }

    fn policy_copy(&self, src: &Policy, disk_safe_id: &str) -> Policy {
        let mut policy = src.clone();
        policy.id = None;
        policy.disk_safe_id = Some(disk_safe_id.to_owned());
        policy.exchange_settings = None;
        policy.sql_server_settings = None;
        if !self.options.include_db_plugin {
            policy.database_instances.clear();
        }
        if !self.options.include_cp_plugin {
            policy.control_panel_instances.clear();
        }
        policy
    }
}
