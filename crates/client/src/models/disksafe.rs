use cdp_domain::error::Result;

use super::{FromValue, ToValue};
use crate::value::{expect_record, Record, Value};

pub const ATTR_DATABASE_BACKUPS: &str = "DATABASE_BACKUPS_ENABLED";
pub const ATTR_CONTROL_PANELS: &str = "CONTROLPANELS_ENABLED";

/// Block-level backup storage for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSafe {
    pub id: Option<String>,
    pub description: String,
    pub agent_id: String,
    pub volume_id: Option<String>,
    pub path: Option<String>,
    /// `diskSafeAttributeMap` entries, in server order.
    pub attributes: Vec<(String, String)>,
    raw: Record,
}

impl DiskSafe {
    /// A new disk safe for `agent_id` on `volume_id` with the defaults new
    /// agents get: QuickLZ/low compression, auto-added devices, partition
    /// table included, unmounted devices skipped.
    pub fn for_new_agent(description: &str, agent_id: &str, volume_id: &str) -> Self {
        let raw = Record::new()
            .with("compressionType", "QUICKLZ")
            .with("compressionLevel", "LOW")
            .with("deviceBackupType", "AUTO_ADD_DEVICES")
            .with("backupPartitionTable", true)
            .with("backupUnmountedDevices", false);
        Self {
            id: None,
            description: description.to_owned(),
            agent_id: agent_id.to_owned(),
            volume_id: Some(volume_id.to_owned()),
            path: None,
            attributes: Vec::new(),
            raw,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite an existing attribute. Returns `false` when the disk safe
    /// has no such attribute; absent attributes are never added.
    pub fn set_attribute(&mut self, key: &str, value: &str) -> bool {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => {
                *v = value.to_owned();
                true
            }
            None => false,
        }
    }
}

fn decode_attributes(raw: &Record) -> Vec<(String, String)> {
    let Some(map) = raw.get("diskSafeAttributeMap").and_then(Value::as_record) else {
        return Vec::new();
    };
    map.list("entry")
        .iter()
        .filter_map(Value::as_record)
        .filter_map(|e| Some((e.opt_str("key")?, e.opt_str("value").unwrap_or_default())))
        .collect()
}

impl FromValue for DiskSafe {
    fn from_value(value: Value) -> Result<Self> {
        let raw = expect_record(value, "disk safe")?;
        Ok(Self {
            id: raw.opt_str("id"),
            description: raw.opt_str("description").unwrap_or_default(),
            agent_id: raw.req_str("agentID")?,
            volume_id: raw.opt_str("volumeID"),
            path: raw.opt_str("path"),
            attributes: decode_attributes(&raw),
            raw,
        })
    }
}

impl ToValue for DiskSafe {
    fn to_value(&self) -> Value {
        let mut r = self.raw.clone();
        r.set("id", self.id.clone());
        r.set("description", self.description.as_str());
        r.set("agentID", self.agent_id.as_str());
        r.set("volumeID", self.volume_id.clone());
        r.set("path", self.path.clone());
        if !self.attributes.is_empty() {
            let entries: Vec<Value> = self
                .attributes
                .iter()
                .map(|(k, v)| Record::new().with("key", k.as_str()).with("value", v.as_str()).into())
                .collect();
            r.set("diskSafeAttributeMap", Record::new().with("entry", entries));
        }
        Value::Record(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DiskSafe {
        let entry = |k: &str, v: &str| -> Value { Record::new().with("key", k).with("value", v).into() };
        let value = Record::new()
            .with("id", "ds-1")
            .with("agentID", "a-1")
            .with("path", "/storage/ds-1")
            .with(
                "diskSafeAttributeMap",
                Record::new().with(
                    "entry",
                    vec![
                        entry(ATTR_DATABASE_BACKUPS, "true"),
                        entry(ATTR_CONTROL_PANELS, "true"),
                    ],
                ),
            )
            .into();
        DiskSafe::from_value(value).unwrap()
    }

    #[test]
    fn attribute_map_decodes() {
        let ds = sample();
        assert_eq!(ds.attribute(ATTR_DATABASE_BACKUPS), Some("true"));
        assert_eq!(ds.attributes.len(), 2);
    }

    #[test]
    fn set_attribute_only_touches_existing_keys() {
        let mut ds = sample();
        assert!(ds.set_attribute(ATTR_CONTROL_PANELS, "false"));
        assert!(!ds.set_attribute("EXCHANGE_ENABLED", "false"));
        assert_eq!(ds.attribute(ATTR_CONTROL_PANELS), Some("false"));
        assert!(ds.attribute("EXCHANGE_ENABLED").is_none());

        let out = ds.to_value();
        let map = out
            .as_record()
            .and_then(|r| r.get("diskSafeAttributeMap"))
            .and_then(Value::as_record)
            .unwrap();
        assert_eq!(map.list("entry").len(), 2);
    }

    #[test]
    fn new_agent_defaults() {
        let ds = DiskSafe::for_new_agent("web1", "a-1", "v-1");
        let out = ds.to_value();
        let r = out.as_record().unwrap();
        assert_eq!(r.opt_str("compressionType").as_deref(), Some("QUICKLZ"));
        assert_eq!(r.opt_str("volumeID").as_deref(), Some("v-1"));
        assert!(r.flag("backupPartitionTable"));
        assert!(!r.contains("id"));
    }
}
