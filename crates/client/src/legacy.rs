//! Typed services for CDP2 servers over XML-RPC.

use std::sync::Arc;

use cdp_domain::error::{Error, Result};
use cdp_domain::settings::ClientSettings;
use cdp_domain::ServerDescriptor;

use crate::http::build_client;
use crate::models::{FromValue, LastBackupInfo, LegacyHost, LegacyId, LegacyTaskSummary};
use crate::namespace::{CallPolicy, NamespaceClientCache, NamespaceHandle};
use crate::transport::Connector;
use crate::value::{Record, Value};
use crate::xmlrpc::XmlRpcConnector;

pub const NS_HOST: &str = "host";
pub const NS_BACKUP_TASK: &str = "backupTask";

/// Client for one CDP2 server.
pub struct LegacyClient {
    cache: NamespaceClientCache,
}

impl LegacyClient {
    pub fn connect(server: &ServerDescriptor, settings: &ClientSettings) -> Result<Self> {
        let http = build_client(settings)?;
        let connector = Arc::new(XmlRpcConnector::new(http, server.clone()));
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

    pub async fn hosts(&self) -> Result<HostService> {
        Ok(HostService(self.cache.get(NS_HOST).await?))
    }

    pub async fn backup_tasks(&self) -> Result<BackupTaskService> {
        Ok(BackupTaskService(self.cache.get(NS_BACKUP_TASK).await?))
    }
}

fn host_param(host_id: &LegacyId) -> Record {
    Record::new().with("hostId", host_id.0.clone())
}

pub struct HostService(Arc<NamespaceHandle>);

impl HostService {
    pub async fn get_host_ids(&self) -> Result<Vec<LegacyId>> {
        LegacyId::list_from_value(self.0.call("getHostIds", Record::new()).await?)
    }

    pub async fn get_host_as_map(&self, host_id: &LegacyId) -> Result<LegacyHost> {
        let value = self.0.call("getHostAsMap", host_param(host_id)).await?;
        if value.is_nil() {
            return Err(Error::NotFound(format!("host {host_id}")));
        }
        LegacyHost::from_value(value)
    }

    pub async fn get_hostname(&self, host_id: &LegacyId) -> Result<String> {
        let value = self.0.call("getHostname", host_param(host_id)).await?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| Error::Decode(format!("expected hostname for host {host_id}, got {value:?}")))
    }

    pub async fn get_last_finished_backup_task_info(&self, host_id: &LegacyId) -> Result<LastBackupInfo> {
        LastBackupInfo::from_value(
            self.0
                .call("getLastFinishedBackupTaskInfo", host_param(host_id))
                .await?,
        )
    }
}

pub struct BackupTaskService(Arc<NamespaceHandle>);

impl BackupTaskService {
    pub async fn get_scheduled_task_ids_by_host(&self, host_id: &LegacyId) -> Result<Vec<Value>> {
        let value = self
            .0
            .call("getScheduledTaskIdsByHost", host_param(host_id))
            .await?;
        Ok(value.into_list())
    }

    pub async fn get_scheduled_task_summary(&self, task_id: &Value) -> Result<LegacyTaskSummary> {
        let params = Record::new().with("taskId", task_id.clone());
        LegacyTaskSummary::from_value(self.0.call("getScheduledTaskSummary", params).await?)
    }

    /// Summaries of every scheduled task on `host_id`.
    pub async fn summaries_for_host(&self, host_id: &LegacyId) -> Result<Vec<LegacyTaskSummary>> {
        let ids = self.get_scheduled_task_ids_by_host(host_id).await?;
        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            out.push(self.get_scheduled_task_summary(id).await?);
        }
        Ok(out)
    }
}
