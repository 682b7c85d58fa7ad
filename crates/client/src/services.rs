//! Typed per-namespace services for CDP3, CDP4 and CDP5 servers.
//!
//! [`CdpClient`] owns one [`NamespaceClientCache`]; each accessor resolves
//! (and on first use connects) the namespace and returns a thin service
//! exposing that namespace's operations by name.

use std::sync::Arc;

use cdp_domain::error::{Error, Result};
use cdp_domain::settings::ClientSettings;
use cdp_domain::ServerDescriptor;

use crate::http::build_client;
use crate::models::{
    Agent, DiskSafe, FromValue, NewAgent, Policy, TaskExecutionContext, ToValue, User, Volume,
};
use crate::namespace::{CallPolicy, NamespaceClientCache, NamespaceHandle};
use crate::soap::SoapConnector;
use crate::transport::Connector;
use crate::value::{Record, Value};

pub const NS_AGENT: &str = "Agent";
pub const NS_DISK_SAFE: &str = "DiskSafe";
pub const NS_POLICY: &str = "Policy2";
pub const NS_TASK_HISTORY: &str = "TaskHistory";
pub const NS_USER: &str = "User";
pub const NS_VOLUME: &str = "Volume";

/// Client for one CDP3+ server.
pub struct CdpClient {
    cache: NamespaceClientCache,
}

impl CdpClient {
    /// Client speaking SOAP to `server`. Nothing is fetched until the first
    /// namespace is used.
    pub fn connect(server: &ServerDescriptor, settings: &ClientSettings) -> Result<Self> {
        let http = build_client(settings)?;
        let connector = Arc::new(SoapConnector::new(http, server.clone()));
        Ok(Self::with_connector(connector, CallPolicy::from(settings)))
    }

    pub fn with_connector(connector: Arc<dyn Connector>, policy: CallPolicy) -> Self {
        Self {
            cache: NamespaceClientCache::new(connector, policy),
        }
    }

    pub fn hostname(&self) -> &str {
        self.cache.server()
    }

    pub async fn agents(&self) -> Result<AgentService> {
        Ok(AgentService(self.cache.get(NS_AGENT).await?))
    }

    pub async fn disk_safes(&self) -> Result<DiskSafeService> {
        Ok(DiskSafeService(self.cache.get(NS_DISK_SAFE).await?))
    }

    pub async fn policies(&self) -> Result<PolicyService> {
        Ok(PolicyService(self.cache.get(NS_POLICY).await?))
    }

    pub async fn task_history(&self) -> Result<TaskHistoryService> {
        Ok(TaskHistoryService(self.cache.get(NS_TASK_HISTORY).await?))
    }

    pub async fn users(&self) -> Result<UserService> {
        Ok(UserService(self.cache.get(NS_USER).await?))
    }

    pub async fn volumes(&self) -> Result<VolumeService> {
        Ok(VolumeService(self.cache.get(NS_VOLUME).await?))
    }
}

/// Decode a single-object result; an empty response means the server found
/// nothing.
fn single<T: FromValue>(value: Value, what: &str) -> Result<T> {
    if value.is_nil() {
        return Err(Error::NotFound(what.to_owned()));
    }
    T::from_value(value)
}

fn by_id(id: &str) -> Record {
    Record::new().with("id", id)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Services
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct AgentService(Arc<NamespaceHandle>);

impl AgentService {
    pub async fn get_agents(&self) -> Result<Vec<Agent>> {
        Agent::list_from_value(self.0.call("getAgents", Record::new()).await?)
    }

    pub async fn get_agent_by_id(&self, id: &str) -> Result<Agent> {
        single(self.0.call("getAgentByID", by_id(id)).await?, &format!("agent {id}"))
    }

    pub async fn create_agent(&self, agent: &NewAgent) -> Result<Agent> {
        let value = self.0.call("createAgent", agent.params()).await?;
        single(value, &format!("created agent {}", agent.hostname))
    }

    pub async fn create_agent_with_object(&self, agent: &Agent) -> Result<Agent> {
        let params = Record::new().with("agent", agent.to_value());
        let value = self.0.call("createAgentWithObject", params).await?;
        single(value, &format!("created agent {}", agent.hostname))
    }

    pub async fn update_agent(&self, agent: &Agent) -> Result<()> {
        let params = Record::new().with("agent", agent.to_value());
        self.0.call("updateAgent", params).await?;
        Ok(())
    }
}

pub struct DiskSafeService(Arc<NamespaceHandle>);

impl DiskSafeService {
    pub async fn get_disk_safes(&self) -> Result<Vec<DiskSafe>> {
        DiskSafe::list_from_value(self.0.call("getDiskSafes", Record::new()).await?)
    }

    pub async fn get_disk_safe_by_id(&self, id: &str) -> Result<DiskSafe> {
        single(
            self.0.call("getDiskSafeByID", by_id(id)).await?,
            &format!("disk safe {id}"),
        )
    }

    pub async fn create_disk_safe_with_object(&self, disk_safe: &DiskSafe) -> Result<DiskSafe> {
        let params = Record::new().with("disksafe", disk_safe.to_value());
        let value = self.0.call("createDiskSafeWithObject", params).await?;
        single(value, &format!("created disk safe {}", disk_safe.description))
    }
}

pub struct PolicyService(Arc<NamespaceHandle>);

impl PolicyService {
    pub async fn get_policies(&self) -> Result<Vec<Policy>> {
        Policy::list_from_value(self.0.call("getPolicies", Record::new()).await?)
    }

    pub async fn get_policy_by_id(&self, id: &str) -> Result<Policy> {
        single(
            self.0.call("getPolicyById", by_id(id)).await?,
            &format!("policy {id}"),
        )
    }

    pub async fn create_policy(&self, policy: &Policy) -> Result<Policy> {
        let params = Record::new().with("policy", policy.to_value());
        let value = self.0.call("createPolicy", params).await?;
        single(value, &format!("created policy {}", policy.name))
    }

    pub async fn update_policy(&self, policy: &Policy) -> Result<()> {
        self.submit("updatePolicy", policy).await
    }

    pub async fn enable_policy(&self, policy: &Policy) -> Result<()> {
        self.submit("enablePolicy", policy).await
    }

    pub async fn disable_policy(&self, policy: &Policy) -> Result<()> {
        self.submit("disablePolicy", policy).await
    }

    async fn submit(&self, operation: &str, policy: &Policy) -> Result<()> {
        let params = Record::new().with("policy", policy.to_value());
        self.0.call(operation, params).await?;
        Ok(())
    }
}

pub struct TaskHistoryService(Arc<NamespaceHandle>);

impl TaskHistoryService {
    pub async fn get_task_execution_context_ids_by_agent(&self, agent_id: &str) -> Result<Vec<String>> {
        let params = Record::new().with("agentID", agent_id);
        let value = self
            .0
            .call("getTaskExecutionContextIDsByAgent", params)
            .await?;
        Ok(value
            .into_list()
            .iter()
            .map(Value::to_display_string)
            .collect())
    }

    pub async fn get_task_execution_context_by_id(&self, id: &str) -> Result<TaskExecutionContext> {
        single(
            self.0.call("getTaskExecutionContextByID", by_id(id)).await?,
            &format!("task {id}"),
        )
    }

    /// Every task recorded for `agent_id`, one request per task.
    pub async fn tasks_for_agent(&self, agent_id: &str) -> Result<Vec<TaskExecutionContext>> {
        let ids = self.get_task_execution_context_ids_by_agent(agent_id).await?;
        let mut tasks = Vec::with_capacity(ids.len());
        for id in &ids {
            tasks.push(self.get_task_execution_context_by_id(id).await?);
        }
        Ok(tasks)
    }
}

pub struct UserService(Arc<NamespaceHandle>);

impl UserService {
    pub async fn get_users(&self) -> Result<Vec<User>> {
        User::list_from_value(self.0.call("getUsers", Record::new()).await?)
    }

    pub async fn update_user(&self, user: &User) -> Result<()> {
        let params = Record::new().with("user", user.to_value());
        self.0.call("updateUser", params).await?;
        Ok(())
    }
}

pub struct VolumeService(Arc<NamespaceHandle>);

impl VolumeService {
    pub async fn get_volumes(&self) -> Result<Vec<Volume>> {
        Volume::list_from_value(self.0.call("getVolumes", Record::new()).await?)
    }
}
