use std::fmt;

use chrono::{DateTime, Utc};

use cdp_domain::error::Result;

use super::{FromValue, ToValue};
use crate::value::{expect_record, Record, Value};

/// Last-run state of a policy as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyState {
    Ok,
    Alert,
    Error,
    /// The policy has never run.
    Unknown,
    Other(String),
}

impl PolicyState {
    pub fn parse(s: &str) -> Self {
        match s {
            "OK" => PolicyState::Ok,
            "ALERT" => PolicyState::Alert,
            "ERROR" => PolicyState::Error,
            "UNKNOWN" => PolicyState::Unknown,
            other => PolicyState::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PolicyState::Ok => "OK",
            PolicyState::Alert => "ALERT",
            PolicyState::Error => "ERROR",
            PolicyState::Unknown => "UNKNOWN",
            PolicyState::Other(s) => s,
        }
    }
}

impl fmt::Display for PolicyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DatabaseInstance
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A database the DB add-on backs up alongside the disk safe.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseInstance {
    pub database_type: String,
    pub name: String,
    pub enabled: bool,
    pub host_name: String,
    pub port_number: i64,
    pub username: String,
    pub password: String,
    raw: Record,
}

impl DatabaseInstance {
    /// The local MySQL instance new and upgraded policies get.
    pub fn local_mysql(username: &str, password: &str) -> Self {
        let raw = Record::new()
            .with("useAlternateDataDirectory", false)
            .with("useAlternateHostname", true)
            .with("useAlternateInstallDirectory", false);
        Self {
            database_type: "MYSQL".into(),
            name: "default".into(),
            enabled: true,
            host_name: "127.0.0.1".into(),
            port_number: 3306,
            username: username.to_owned(),
            password: password.to_owned(),
            raw,
        }
    }
}

impl FromValue for DatabaseInstance {
    fn from_value(value: Value) -> Result<Self> {
        let raw = expect_record(value, "database instance")?;
        Ok(Self {
            database_type: raw.opt_str("dataBaseType").unwrap_or_default(),
            name: raw.opt_str("name").unwrap_or_default(),
            enabled: raw.flag("enabled"),
            host_name: raw.opt_str("hostName").unwrap_or_default(),
            port_number: raw.opt_i64("portNumber").unwrap_or(3306),
            username: raw.opt_str("username").unwrap_or_default(),
            password: raw.opt_str("password").unwrap_or_default(),
            raw,
        })
    }
}

impl ToValue for DatabaseInstance {
    fn to_value(&self) -> Value {
        let mut r = self.raw.clone();
        r.set("dataBaseType", self.database_type.as_str());
        r.set("enabled", self.enabled);
        r.set("hostName", self.host_name.as_str());
        r.set("name", self.name.as_str());
        r.set("username", self.username.as_str());
        r.set("password", self.password.as_str());
        r.set("portNumber", self.port_number);
        Value::Record(r)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A scheduled backup configuration bound to one disk safe.
///
/// Fields that only some server generations or add-ons provide are
/// optional: `last_replication_run_time` exists on CDP5 only, and policies
/// without a disk safe have no `disk_safe_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub disk_safe_id: Option<String>,
    pub state: PolicyState,
    pub recovery_point_limit: Option<i64>,
    pub last_replication_run_time: Option<DateTime<Utc>>,
    pub database_instances: Vec<DatabaseInstance>,
    pub control_panel_instances: Vec<Value>,
    pub exchange_settings: Option<Value>,
    pub sql_server_settings: Option<Value>,
    raw: Record,
}

impl Policy {
    /// A policy that replicates daily at 00:00 and merges on demand.
    pub fn daily(name: &str, description: &str, disk_safe_id: &str, recovery_point_limit: i64) -> Self {
        let frequency = Record::new()
            .with("hoursOfDay", Value::List(vec![Value::Int(0)]))
            .with("startingMinute", Value::Int(0));
        let raw = Record::new()
            .with("mergeScheduleFrequencyType", "ON_DEMAND")
            .with("replicationScheduleFrequencyType", "DAILY")
            .with("replicationScheduleFrequencyValues", frequency)
            .with("forceFullBlockScan", false);
        Self {
            id: None,
            name: name.to_owned(),
            description: description.to_owned(),
            enabled: true,
            disk_safe_id: Some(disk_safe_id.to_owned()),
            state: PolicyState::Unknown,
            recovery_point_limit: Some(recovery_point_limit),
            last_replication_run_time: None,
            database_instances: Vec::new(),
            control_panel_instances: Vec::new(),
            exchange_settings: None,
            sql_server_settings: None,
            raw,
        }
    }
}

impl FromValue for Policy {
    fn from_value(value: Value) -> Result<Self> {
        let raw = expect_record(value, "policy")?;
        Ok(Self {
            id: raw.opt_str("id"),
            name: raw.opt_str("name").unwrap_or_default(),
            description: raw.opt_str("description").unwrap_or_default(),
            enabled: raw.flag("enabled"),
            disk_safe_id: raw.opt_str("diskSafeID"),
            state: PolicyState::parse(&raw.opt_str("state").unwrap_or_default()),
            recovery_point_limit: raw.opt_i64("recoveryPointLimit"),
            last_replication_run_time: raw.opt_datetime("lastReplicationRunTime"),
            database_instances: raw
                .list("databaseInstanceList")
                .into_iter()
                .map(DatabaseInstance::from_value)
                .collect::<Result<_>>()?,
            control_panel_instances: raw.list("controlPanelInstanceList"),
            exchange_settings: raw.get("exchangeSettings").cloned(),
            sql_server_settings: raw.get("SQLServerSettings").cloned(),
            raw,
        })
    }
}

impl ToValue for Policy {
    fn to_value(&self) -> Value {
        let mut r = self.raw.clone();
        r.set("id", self.id.clone());
        r.set("name", self.name.as_str());
        r.set("description", self.description.as_str());
        r.set("enabled", self.enabled);
        r.set("diskSafeID", self.disk_safe_id.clone());
        r.set("recoveryPointLimit", self.recovery_point_limit);
        r.set(
            "databaseInstanceList",
            Value::List(self.database_instances.iter().map(ToValue::to_value).collect()),
        );
        r.set(
            "controlPanelInstanceList",
            Value::List(self.control_panel_instances.clone()),
        );
        r.set("exchangeSettings", self.exchange_settings.clone());
        r.set("SQLServerSettings", self.sql_server_settings.clone());
        Value::Record(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v5_policy() -> Policy {
        Policy::from_value(
            Record::new()
                .with("id", "p-1")
                .with("name", "web1")
                .with("enabled", "true")
                .with("diskSafeID", "ds-1")
                .with("state", "ALERT")
                .with("recoveryPointLimit", "14")
                .with("lastReplicationRunTime", "2016-03-01T00:05:10.123Z")
                .with(
                    "databaseInstanceList",
                    Record::new().with("name", "default").with("dataBaseType", "MYSQL"),
                )
                .with("exchangeSettings", Record::new().with("enabled", "false"))
                .into(),
        )
        .unwrap()
    }

    #[test]
    fn decodes_optional_fields() {
        let p = v5_policy();
        assert_eq!(p.state, PolicyState::Alert);
        assert_eq!(p.recovery_point_limit, Some(14));
        assert!(p.last_replication_run_time.is_some());
        assert_eq!(p.database_instances.len(), 1);
        assert_eq!(p.database_instances[0].database_type, "MYSQL");
        assert!(p.exchange_settings.is_some());
    }

    #[test]
    fn cleared_settings_are_omitted() {
        let mut p = v5_policy();
        p.exchange_settings = None;
        p.database_instances.clear();
        let out = p.to_value();
        let r = out.as_record().unwrap();
        assert!(!r.contains("exchangeSettings"));
        assert!(r.list("databaseInstanceList").is_empty());
        assert_eq!(r.opt_str("lastReplicationRunTime").as_deref(), Some("2016-03-01T00:05:10.123Z"));
    }

    #[test]
    fn unknown_state_is_kept_verbatim() {
        assert_eq!(PolicyState::parse("REPLICATING").as_str(), "REPLICATING");
    }

    #[test]
    fn daily_policy_schedule() {
        let p = Policy::daily("web1", "web1", "ds-9", 30);
        let out = p.to_value();
        let r = out.as_record().unwrap();
        assert_eq!(r.opt_str("replicationScheduleFrequencyType").as_deref(), Some("DAILY"));
        assert_eq!(r.opt_i64("recoveryPointLimit"), Some(30));
        assert!(r.flag("enabled"));
    }
}
