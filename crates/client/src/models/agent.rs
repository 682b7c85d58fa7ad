use cdp_domain::error::Result;

use super::{FromValue, ToValue};
use crate::value::{expect_record, Record, Value};

/// Default port the backup agent listens on.
pub const AGENT_PORT: i64 = 1167;

/// A protected machine registered on a CDP3+ server.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: Option<String>,
    pub hostname: String,
    pub port_number: Option<i64>,
    pub description: String,
    pub os_type: Option<String>,
    pub database_add_on_enabled: bool,
    raw: Record,
}

impl Agent {
    /// Identifier, or an empty string for an agent not yet created.
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

impl FromValue for Agent {
    fn from_value(value: Value) -> Result<Self> {
        let raw = expect_record(value, "agent")?;
        Ok(Self {
            id: raw.opt_str("id"),
            hostname: raw.req_str("hostname")?,
            port_number: raw.opt_i64("portNumber"),
            description: raw.opt_str("description").unwrap_or_default(),
            os_type: raw.opt_str("osType"),
            database_add_on_enabled: raw.flag("databaseAddOnEnabled"),
            raw,
        })
    }
}

impl ToValue for Agent {
    fn to_value(&self) -> Value {
        let mut r = self.raw.clone();
        r.set("id", self.id.clone());
        r.set("hostname", self.hostname.as_str());
        r.set("portNumber", self.port_number);
        r.set("description", self.description.as_str());
        r.set("osType", self.os_type.clone());
        r.set("databaseAddOnEnabled", self.database_add_on_enabled);
        Value::Record(r)
    }
}

/// Parameters of `Agent.createAgent`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAgent {
    pub hostname: String,
    pub port_number: i64,
    pub description: String,
    pub database_add_on_enabled: bool,
}

impl NewAgent {
    pub fn params(&self) -> Record {
        Record::new()
            .with("hostname", self.hostname.as_str())
            .with("portNumber", self.port_number)
            .with("description", self.description.as_str())
            .with("databaseAddOnEnabled", self.database_add_on_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_survive_resubmission() {
        let value = Record::new()
            .with("id", "a-1")
            .with("hostname", "web1")
            .with("databaseAddOnEnabled", "false")
            .with("agentType", "PHYSICAL")
            .into();
        let mut agent = Agent::from_value(value).unwrap();
        assert!(!agent.database_add_on_enabled);

        agent.database_add_on_enabled = true;
        agent.id = None;
        let out = agent.to_value();
        let out = out.as_record().unwrap();
        assert_eq!(out.opt_str("agentType").as_deref(), Some("PHYSICAL"));
        assert!(out.flag("databaseAddOnEnabled"));
        assert!(!out.contains("id"));
    }

    #[test]
    fn hostname_is_required() {
        let value = Record::new().with("id", "a-1").into();
        assert!(Agent::from_value(value).is_err());
    }
}
