use cdp_domain::error::Result;

use super::{FromValue, ToValue};
use crate::value::{expect_record, Record, Value};

/// A console/API user account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Option<String>,
    pub username: String,
    pub password: Option<String>,
    raw: Record,
}

impl FromValue for User {
    fn from_value(value: Value) -> Result<Self> {
        let raw = expect_record(value, "user")?;
        Ok(Self {
            id: raw.opt_str("id"),
            username: raw.req_str("username")?,
            password: raw.opt_str("password"),
            raw,
        })
    }
}

impl ToValue for User {
    fn to_value(&self) -> Value {
        let mut r = self.raw.clone();
        r.set("id", self.id.clone());
        r.set("username", self.username.as_str());
        r.set("password", self.password.clone());
        Value::Record(r)
    }
}

/// A storage volume disk safes live on.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub id: String,
    pub name: String,
}

impl FromValue for Volume {
    fn from_value(value: Value) -> Result<Self> {
        let raw = expect_record(value, "volume")?;
        Ok(Self {
            id: raw.req_str("id")?,
            name: raw.opt_str("name").unwrap_or_default(),
        })
    }
}
