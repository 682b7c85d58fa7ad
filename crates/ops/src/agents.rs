//! Host-oriented agent commands: listing and provisioning.

use cdp_client::models::{DiskSafe, NewAgent, Policy, AGENT_PORT};
use cdp_client::CdpClient;
use cdp_domain::error::{Error, Result};

use crate::db_plugin::MysqlCredentials;

pub const DEFAULT_RECOVERY_POINTS: i64 = 30;

/// Every agent hostname registered on the server, in server order.
pub async fn list_agents(client: &CdpClient) -> Result<Vec<String>> {
    let agents = client.agents().await?.get_agents().await?;
    Ok(agents.into_iter().map(|a| a.hostname).collect())
}

/// `decoration`, then `host`, then `decoration` reversed.
pub fn banner(decoration: &str, host: &str) -> String {
    let closing: String = decoration.chars().rev().collect();
    format!("{decoration}{host}{closing}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedAgent {
    pub hostname: String,
    pub agent_id: String,
    pub disk_safe_id: String,
    pub policy_id: String,
}

/// Provision an agent with a disk safe and a daily policy.
#[derive(Debug, Clone)]
pub struct AddAgent {
    pub description: Option<String>,
    /// Enables the database add-on and attaches a local MySQL instance.
    pub db_addon: Option<MysqlCredentials>,
    pub recovery_point_limit: i64,
}

impl Default for AddAgent {
    fn default() -> Self {
        Self {
            description: None,
            db_addon: None,
            recovery_point_limit: DEFAULT_RECOVERY_POINTS,
        }
    }
}

impl AddAgent {
    fn description_for(&self, hostname: &str) -> String {
        match &self.description {
            Some(d) => format!("{d} ({hostname})"),
            None => hostname.to_owned(),
        }
    }

    pub async fn add(&self, client: &CdpClient, hostname: &str) -> Result<AddedAgent> {
        let description = self.description_for(hostname);
        let volume = client
            .volumes()
            .await?
            .get_volumes()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("volume on {}", client.hostname())))?;

        let agent = client
            .agents()
            .await?
            .create_agent(&NewAgent {
                hostname: hostname.to_owned(),
                port_number: AGENT_PORT,
                description: description.clone(),
                database_add_on_enabled: self.db_addon.is_some(),
            })
            .await?;
        let agent_id = agent.id_str().to_owned();
        tracing::info!(agent = %hostname, id = %agent_id, "created agent");

        let disk_safe = client
            .disk_safes()
            .await?
            .create_disk_safe_with_object(&DiskSafe::for_new_agent(hostname, &agent_id, &volume.id))
            .await?;
        let disk_safe_id = disk_safe
            .id
            .ok_or_else(|| Error::Decode("created disk safe has no id".into()))?;
        tracing::info!(disk_safe = %disk_safe_id, volume = %volume.name, "created disk safe");

        let mut policy = Policy::daily(hostname, &description, &disk_safe_id, self.recovery_point_limit);
        if let Some(mysql) = &self.db_addon {
            policy.database_instances.push(mysql.instance());
        }
        let policy = client.policies().await?.create_policy(&policy).await?;
        let policy_id = policy.id.unwrap_or_default();
        tracing::info!(policy = %policy_id, "created policy");

        Ok(AddedAgent {
            hostname: hostname.to_owned(),
            agent_id,
            disk_safe_id,
            policy_id,
        })
    }
}
