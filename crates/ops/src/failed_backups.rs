//! Audit which hosts have failing backups.
//!
//! Per server the report carries the most recent successful run and the
//! hosts whose last run failed. Each API generation exposes that state
//! differently:
//!
//! * CDP2: the host's last finished backup task carries a status word.
//! * CDP3/4: the policy state says whether the last run failed; the task
//!   history supplies the times.
//! * CDP5: the policy also carries its last replication time, and a run
//!   that has been RUNNING for more than a day is reported as stuck.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt, TryStreamExt};

use cdp_client::models::{Policy, PolicyState, TaskExecutionContext};
use cdp_client::ClientFactory;
use cdp_domain::error::{Error, Result};
use cdp_domain::{ProtocolVersion, ServerDescriptor};

use crate::dispatch::VersionDispatcher;

/// Per-policy clients run concurrently on CDP5 servers, up to this many.
pub const POLICY_WORKERS: usize = 4;

/// A RUNNING task older than this is reported as stuck.
pub fn stuck_after() -> Duration {
    Duration::hours(24)
}

/// Why a host is listed as failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureStatus {
    /// Time of the failed run, or of the last finished run.
    At(DateTime<Utc>),
    /// Failing, with no finished run on record.
    NoFinishedRun,
    /// Failing, with no finished run left in the task history.
    OlderThanHistory,
    Stuck { since: DateTime<Utc> },
}

impl fmt::Display for FailureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStatus::At(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            FailureStatus::NoFinishedRun => f.write_str("never"),
            FailureStatus::OlderThanHistory => f.write_str("> 30 days"),
            FailureStatus::Stuck { since } => {
                write!(f, "**STUCK** since {}", since.format("%Y-%m-%d %H:%M:%S"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailingHost {
    pub hostname: String,
    pub status: FailureStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedBackupsReport {
    pub last_successful: Option<DateTime<Utc>>,
    pub failing: Vec<FailingHost>,
}

impl FailedBackupsReport {
    fn saw_success(&mut self, at: DateTime<Utc>) {
        self.last_successful = self.last_successful.max(Some(at));
    }
}

/// Policy-run tasks with an execution time, oldest first.
fn policy_runs(tasks: Vec<TaskExecutionContext>) -> Vec<(DateTime<Utc>, TaskExecutionContext)> {
    let mut runs: Vec<_> = tasks
        .into_iter()
        .filter(|t| t.is_policy_run())
        .filter_map(|t| t.execution_time.map(|at| (at, t)))
        .collect();
    runs.sort_by_key(|(at, _)| *at);
    runs
}

fn latest_where(
    runs: &[(DateTime<Utc>, TaskExecutionContext)],
    pred: impl Fn(&TaskExecutionContext) -> bool,
) -> Option<DateTime<Utc>> {
    runs.iter().rev().find(|(_, t)| pred(t)).map(|(at, _)| *at)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FailedBackups
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FailedBackups {
    factory: Arc<dyn ClientFactory>,
    now: Option<DateTime<Utc>>,
}

impl FailedBackups {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self { factory, now: None }
    }

    /// Evaluate stuck runs against a fixed time instead of the clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    pub fn dispatcher(self: Arc<Self>, workers: usize) -> VersionDispatcher<FailedBackupsReport> {
        let (v2, v34, v5) = (self.clone(), self.clone(), self);
        VersionDispatcher::new()
            .workers(workers)
            .on(&[ProtocolVersion::V2], move |s| {
                let op = v2.clone();
                async move { op.handle_v2(&s).await }
            })
            .on(&[ProtocolVersion::V3, ProtocolVersion::V4], move |s| {
                let op = v34.clone();
                async move { op.handle_v3(&s).await }
            })
            .on(&[ProtocolVersion::V5], move |s| {
                let op = v5.clone();
                async move { op.handle_v5(&s).await }
            })
    }

    pub async fn handle_v2(&self, server: &ServerDescriptor) -> Result<FailedBackupsReport> {
        let client = self.factory.legacy(server)?;
        let hosts = client.hosts().await?;
        let tasks = client.backup_tasks().await?;
        let mut report = FailedBackupsReport::default();

        for host_id in hosts.get_host_ids().await? {
            let summaries = tasks.summaries_for_host(&host_id).await?;
            if !summaries.iter().any(|t| t.is_active_backup()) {
                tracing::debug!(host = %host_id, "no enabled backup task, skipping");
                continue;
            }
            let last = hosts.get_last_finished_backup_task_info(&host_id).await?;
            report.saw_success(last.finished_at);
            if last.is_error() {
                report.failing.push(FailingHost {
                    hostname: hosts.get_hostname(&host_id).await?,
                    status: FailureStatus::At(last.finished_at),
                });
            }
        }
        Ok(report)
    }

    pub async fn handle_v3(&self, server: &ServerDescriptor) -> Result<FailedBackupsReport> {
        let client = self.factory.cdp(server)?;
        let policies = client.policies().await?.get_policies().await?;
        let disk_safes = client.disk_safes().await?;
        let agents = client.agents().await?;
        let history = client.task_history().await?;
        let mut report = FailedBackupsReport::default();

        for policy in policies.into_iter().filter(|p| p.enabled) {
            let Some(disk_safe_id) = policy.disk_safe_id.as_deref() else {
                tracing::debug!(policy = %policy.name, "policy has no disk safe, skipping");
                continue;
            };
            let disk_safe = disk_safes.get_disk_safe_by_id(disk_safe_id).await?;
            let agent = agents.get_agent_by_id(&disk_safe.agent_id).await?;
            let runs = policy_runs(history.tasks_for_agent(&disk_safe.agent_id).await?);

            if let Some((at, _)) = runs.last() {
                report.saw_success(*at);
            }
            if matches!(policy.state, PolicyState::Error | PolicyState::Unknown) {
                let status = match latest_where(&runs, TaskExecutionContext::is_finished) {
                    Some(at) => FailureStatus::At(at),
                    None => FailureStatus::NoFinishedRun,
                };
                report.failing.push(FailingHost {
                    hostname: agent.hostname,
                    status,
                });
            }
        }
        Ok(report)
    }

    pub async fn handle_v5(&self, server: &ServerDescriptor) -> Result<FailedBackupsReport> {
        let policies: Vec<Policy> = self
            .factory
            .cdp(server)?
            .policies()
            .await?
            .get_policies()
            .await?
            .into_iter()
            .filter(|p| p.enabled && p.disk_safe_id.is_some())
            .collect();

        let results: Vec<_> = stream::iter(policies)
            .map(|policy| self.check_v5_policy(server, policy))
            .buffered(POLICY_WORKERS)
            .try_collect()
            .await?;

        let mut report = FailedBackupsReport::default();
        for (last_successful, failing) in results {
            if let Some(at) = last_successful {
                report.saw_success(at);
            }
            report.failing.extend(failing);
        }
        Ok(report)
    }

    /// Check one CDP5 policy on its own client.
    async fn check_v5_policy(
        &self,
        server: &ServerDescriptor,
        policy: Policy,
    ) -> Result<(Option<DateTime<Utc>>, Option<FailingHost>)> {
        let disk_safe_id = policy
            .disk_safe_id
            .as_deref()
            .ok_or_else(|| Error::NotFound(format!("disk safe of policy {}", policy.name)))?;
        let client = self.factory.cdp(server)?;
        let disk_safe = client
            .disk_safes()
            .await?
            .get_disk_safe_by_id(disk_safe_id)
            .await?;
        let agent = client
            .agents()
            .await?
            .get_agent_by_id(&disk_safe.agent_id)
            .await?;
        let runs = policy_runs(
            client
                .task_history()
                .await?
                .tasks_for_agent(&disk_safe.agent_id)
                .await?,
        );

        match policy.state {
            PolicyState::Ok | PolicyState::Alert => {
                if let Some(since) = latest_where(&runs, TaskExecutionContext::is_running) {
                    if self.now() - since > stuck_after() {
                        let failing = FailingHost {
                            hostname: agent.hostname,
                            status: FailureStatus::Stuck { since },
                        };
                        return Ok((None, Some(failing)));
                    }
                }
                Ok((policy.last_replication_run_time, None))
            }
            PolicyState::Error => {
                let status = match latest_where(&runs, TaskExecutionContext::is_finished) {
                    Some(at) => FailureStatus::At(at),
                    None => FailureStatus::OlderThanHistory,
                };
                let failing = FailingHost {
                    hostname: agent.hostname,
                    status,
                };
                Ok((None, Some(failing)))
            }
            // Never run, or a state this tool doesn't judge.
            PolicyState::Unknown | PolicyState::Other(_) => Ok((None, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use cdp_client::testing::{ScriptedConnector, ScriptedFactory};
    use cdp_client::{Record, Value};

    use super::*;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 3, day, hour, 0, 0).unwrap()
    }

    fn rfc(t: DateTime<Utc>) -> String {
        t.to_rfc3339()
    }

    fn task(id: &str, state: &str, at: DateTime<Utc>) -> Value {
        Record::new()
            .with("id", id)
            .with("taskType", "DATA_PROTECTION_POLICY")
            .with("taskState", state)
            .with("executionTime", rfc(at))
            .into()
    }

    /// One policy -> disk safe -> agent chain with the given tasks.
    fn script_policy(
        server: &ScriptedConnector,
        policy: Record,
        tasks: Vec<Value>,
    ) {
        let ids: Vec<Value> = tasks
            .iter()
            .filter_map(|t| t.as_record().and_then(|r| r.opt_str("id")))
            .map(Value::from)
            .collect();
        server
            .on("Policy2", "getPolicies", policy)
            .on(
                "DiskSafe",
                "getDiskSafeByID",
                Record::new().with("id", "ds-1").with("agentID", "a-1"),
            )
            .on(
                "Agent",
                "getAgentByID",
                Record::new().with("id", "a-1").with("hostname", "web1"),
            )
            .on("TaskHistory", "getTaskExecutionContextIDsByAgent", Value::List(ids))
            .on_call("TaskHistory", "getTaskExecutionContextByID", move |params| {
                let id = params.req_str("id")?;
                tasks
                    .iter()
                    .find(|t| t.as_record().and_then(|r| r.opt_str("id")).as_deref() == Some(id.as_str()))
                    .cloned()
                    .ok_or_else(|| Error::NotFound(id))
            });
    }

    fn policy(state: &str) -> Record {
        Record::new()
            .with("id", "p-1")
            .with("name", "web1")
            .with("enabled", "true")
            .with("diskSafeID", "ds-1")
            .with("state", state)
            .with("lastReplicationRunTime", rfc(ts(2, 0)))
    }

    fn op(factory: ScriptedFactory) -> FailedBackups {
        FailedBackups::new(Arc::new(factory)).at(ts(10, 12))
    }

    fn v(version: ProtocolVersion) -> ServerDescriptor {
        ServerDescriptor::with_default_port(version, "cdp-a", true, "admin", "secret")
    }

    #[tokio::test]
    async fn v5_ok_policy_reports_last_replication() {
        let factory = ScriptedFactory::new();
        script_policy(
            &factory.server("cdp-a"),
            policy("OK"),
            vec![task("t1", "FINISHED", ts(2, 0))],
        );
        let report = op(factory).handle_v5(&v(ProtocolVersion::V5)).await.unwrap();
        assert_eq!(report.last_successful, Some(ts(2, 0)));
        assert!(report.failing.is_empty());
    }

    #[tokio::test]
    async fn v5_long_running_task_is_stuck() {
        let factory = ScriptedFactory::new();
        script_policy(
            &factory.server("cdp-a"),
            policy("ALERT"),
            vec![
                task("t1", "FINISHED", ts(7, 0)),
                task("t2", "RUNNING", ts(8, 0)),
            ],
        );
        let report = op(factory).handle_v5(&v(ProtocolVersion::V5)).await.unwrap();
        assert_eq!(report.last_successful, None);
        assert_eq!(
            report.failing,
            [FailingHost {
                hostname: "web1".into(),
                status: FailureStatus::Stuck { since: ts(8, 0) },
            }]
        );
        assert_eq!(
            report.failing[0].status.to_string(),
            "**STUCK** since 2016-03-08 00:00:00"
        );
    }

    #[tokio::test]
    async fn v5_recent_running_task_is_not_stuck() {
        let factory = ScriptedFactory::new();
        script_policy(
            &factory.server("cdp-a"),
            policy("OK"),
            vec![task("t1", "RUNNING", ts(10, 0))],
        );
        let report = op(factory).handle_v5(&v(ProtocolVersion::V5)).await.unwrap();
        assert!(report.failing.is_empty());
        assert_eq!(report.last_successful, Some(ts(2, 0)));
    }

    #[tokio::test]
    async fn v5_error_without_finished_run_is_older_than_history() {
        let factory = ScriptedFactory::new();
        script_policy(
            &factory.server("cdp-a"),
            policy("ERROR"),
            vec![task("t1", "RUNNING", ts(9, 0))],
        );
        let report = op(factory).handle_v5(&v(ProtocolVersion::V5)).await.unwrap();
        assert_eq!(report.failing[0].status, FailureStatus::OlderThanHistory);
        assert_eq!(report.failing[0].status.to_string(), "> 30 days");
    }

    #[tokio::test]
    async fn v5_never_run_policy_is_skipped() {
        let factory = ScriptedFactory::new();
        script_policy(&factory.server("cdp-a"), policy("UNKNOWN"), vec![]);
        let report = op(factory).handle_v5(&v(ProtocolVersion::V5)).await.unwrap();
        assert_eq!(report, FailedBackupsReport::default());
    }

    #[tokio::test]
    async fn v3_error_policy_uses_latest_finished_task() {
        let factory = ScriptedFactory::new();
        script_policy(
            &factory.server("cdp-a"),
            policy("ERROR"),
            vec![
                task("t2", "FINISHED", ts(5, 0)),
                task("t1", "FINISHED", ts(4, 0)),
                task("t3", "ERROR", ts(6, 0)),
            ],
        );
        let report = op(factory).handle_v3(&v(ProtocolVersion::V3)).await.unwrap();
        assert_eq!(report.last_successful, Some(ts(6, 0)));
        assert_eq!(report.failing[0].status, FailureStatus::At(ts(5, 0)));
    }

    #[tokio::test]
    async fn v3_disabled_policy_is_skipped() {
        let factory = ScriptedFactory::new();
        let server = factory.server("cdp-a");
        server.on(
            "Policy2",
            "getPolicies",
            policy("ERROR").with("enabled", "false"),
        );
        let report = op(factory).handle_v3(&v(ProtocolVersion::V3)).await.unwrap();
        assert!(report.failing.is_empty());
        assert!(server.calls_to("DiskSafe", "getDiskSafeByID").is_empty());
    }

    #[tokio::test]
    async fn v2_error_status_lists_host() {
        let factory = ScriptedFactory::new();
        factory
            .server("cdp-a")
            .on("host", "getHostIds", Value::List(vec![Value::Int(1), Value::Int(2)]))
            .on("host", "getHostname", "old1")
            .on(
                "host",
                "getLastFinishedBackupTaskInfo",
                Value::List(vec!["error".into(), "Thu Jun 27 2013 02:03:33 EDT".into()]),
            )
            .on_call("backupTask", "getScheduledTaskIdsByHost", |params| {
                // Host 2 has no tasks at all.
                Ok(match params.opt_i64("hostId") {
                    Some(1) => Value::List(vec![Value::Int(10)]),
                    _ => Value::Nil,
                })
            })
            .on(
                "backupTask",
                "getScheduledTaskSummary",
                Record::new().with("taskType", "Backup").with("enabled", true),
            );
        let report = op(factory).handle_v2(&v(ProtocolVersion::V2)).await.unwrap();
        assert_eq!(report.failing.len(), 1);
        assert_eq!(report.failing[0].hostname, "old1");
        assert_eq!(report.failing[0].status.to_string(), "2013-06-27 02:03:33");
        assert_eq!(report.last_successful, Some(Utc.with_ymd_and_hms(2013, 6, 27, 2, 3, 33).unwrap()));
    }
}
