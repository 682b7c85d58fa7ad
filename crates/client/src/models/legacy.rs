//! CDP2 host and backup-task objects.
//!
//! CDP2 predates the agent/disk-safe/policy graph. A host carries its own
//! enabled flag and add-on switches, and backups are scheduled tasks
//! attached to the host.

use std::fmt;

use chrono::{DateTime, Utc};

use cdp_domain::error::{Error, Result};

use super::FromValue;
use crate::value::{expect_record, parse_legacy_timestamp, Value};

/// Task type of a scheduled backup on CDP2.
pub const LEGACY_TASK_BACKUP: &str = "Backup";

/// Status CDP2 reports for a failed backup run.
pub const LEGACY_STATUS_ERROR: &str = "error";

/// A host identifier, passed back to the server exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyId(pub Value);

impl fmt::Display for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_display_string())
    }
}

impl FromValue for LegacyId {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(_) | Value::Str(_) => Ok(LegacyId(value)),
            other => Err(Error::Decode(format!("expected host id, got {other:?}"))),
        }
    }
}

/// Display name for a CDP2 `hostType` code.
pub fn legacy_host_type(code: i64) -> String {
    match code {
        0 => "LINUX".into(),
        1 => "WINDOWS".into(),
        n => format!("TYPE{n}"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyHost {
    pub host_id: LegacyId,
    pub hostname: String,
    pub description: String,
    pub host_type: String,
    pub enabled: bool,
    pub control_panel_module_enabled: bool,
    pub mysql_addon_enabled: bool,
}

impl FromValue for LegacyHost {
    fn from_value(value: Value) -> Result<Self> {
        let raw = expect_record(value, "host")?;
        let host_id = raw
            .get("hostID")
            .cloned()
            .ok_or_else(|| Error::Decode("missing field \"hostID\"".into()))
            .and_then(LegacyId::from_value)?;
        Ok(Self {
            host_id,
            hostname: raw.req_str("hostname")?,
            description: raw.opt_str("description").unwrap_or_default(),
            host_type: legacy_host_type(raw.opt_i64("hostType").unwrap_or(-1)),
            enabled: raw.flag("enabled"),
            control_panel_module_enabled: raw.flag("controlPanelModuleEnabled"),
            mysql_addon_enabled: raw.flag("cdpForMySqlAddonEnabled"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyTaskSummary {
    pub task_type: String,
    pub enabled: bool,
}

impl LegacyTaskSummary {
    /// An enabled scheduled backup.
    pub fn is_active_backup(&self) -> bool {
        self.enabled && self.task_type == LEGACY_TASK_BACKUP
    }
}

impl FromValue for LegacyTaskSummary {
    fn from_value(value: Value) -> Result<Self> {
        let raw = expect_record(value, "task summary")?;
        Ok(Self {
            task_type: raw.opt_str("taskType").unwrap_or_default(),
            enabled: raw.flag("enabled"),
        })
    }
}

/// Outcome of a host's most recent finished backup.
///
/// The server answers with a two-element array: the status word and the
/// finish time.
#[derive(Debug, Clone, PartialEq)]
pub struct LastBackupInfo {
    pub status: String,
    pub finished_at: DateTime<Utc>,
}

impl LastBackupInfo {
    pub fn is_error(&self) -> bool {
        self.status == LEGACY_STATUS_ERROR
    }
}

impl FromValue for LastBackupInfo {
    fn from_value(value: Value) -> Result<Self> {
        let items = value.into_list();
        let [status, finished] = items.as_slice() else {
            return Err(Error::Decode(format!(
                "expected [status, time] pair, got {} items",
                items.len()
            )));
        };
        let finished = finished.to_display_string();
        let finished_at = parse_legacy_timestamp(&finished)
            .ok_or_else(|| Error::Decode(format!("invalid backup time {finished:?}")))?;
        Ok(Self {
            status: status.to_display_string(),
            finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    #[test]
    fn host_map_decodes() {
        let value = Record::new()
            .with("hostID", Value::Int(12))
            .with("hostname", "web1.example.com")
            .with("hostType", Value::Int(1))
            .with("enabled", true)
            .with("cdpForMySqlAddonEnabled", Value::Int(1))
            .into();
        let host = LegacyHost::from_value(value).unwrap();
        assert_eq!(host.host_id.to_string(), "12");
        assert_eq!(host.host_type, "WINDOWS");
        assert!(host.mysql_addon_enabled);
        assert!(!host.control_panel_module_enabled);
    }

    #[test]
    fn unknown_host_type_is_labelled() {
        assert_eq!(legacy_host_type(7), "TYPE7");
    }

    #[test]
    fn last_backup_pair() {
        let value = Value::List(vec![
            Value::from("error"),
            Value::from("Thu Jun 27 2013 02:03:33 EDT"),
        ]);
        let info = LastBackupInfo::from_value(value).unwrap();
        assert!(info.is_error());
        assert_eq!(info.finished_at.to_string(), "2013-06-27 02:03:33 UTC");
    }

    #[test]
    fn short_backup_info_is_rejected() {
        let value = Value::List(vec![Value::from("ok")]);
        assert!(matches!(
            LastBackupInfo::from_value(value),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn backup_task_filter() {
        let t = LegacyTaskSummary {
            task_type: "Backup".into(),
            enabled: true,
        };
        assert!(t.is_active_backup());
        let t = LegacyTaskSummary {
            task_type: "Restore".into(),
            enabled: true,
        };
        assert!(!t.is_active_backup());
    }
}
