//! Wire-level values shared by the SOAP and XML-RPC codecs.
//!
//! Both protocols carry loosely-typed structures. The codecs decode into
//! [`Value`] and the model layer normalizes those into typed structs.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

use cdp_domain::error::{Error, Result};

/// A decoded remote value.
///
/// SOAP responses carry no type information in the body, so scalars decoded
/// from SOAP arrive as [`Value::Str`] and the typed accessors parse them on
/// demand. XML-RPC scalars keep their declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    DateTime(String),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::DateTime(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Str(s) => match s.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Timestamps are truncated to whole seconds.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.as_str().and_then(parse_timestamp)
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Interpret the value as a sequence.
    ///
    /// Document/literal encodings don't distinguish a one-element list from
    /// a single value, and an empty list from an absent one.
    pub fn into_list(self) -> Vec<Value> {
        match self {
            Value::Nil => Vec::new(),
            Value::List(items) => items,
            other => vec![other],
        }
    }

    /// Render a scalar for display; records and lists use their debug form.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Str(s) | Value::DateTime(s) => s.clone(),
            other => format!("{other:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An ordered set of named fields.
///
/// Field order is kept as received so that resubmitted objects serialize in
/// the sequence the server's schema declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Replace the field in place, or append it when absent.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_owned(), value)),
        }
    }

    /// Append without replacing; used by decoders for repeated elements.
    pub(crate) fn push(&mut self, name: String, value: Value) {
        self.fields.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .filter(|v| !v.is_nil())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    // ── typed accessors ────────────────────────────────────────────

    pub fn opt_str(&self, name: &str) -> Option<String> {
        self.get(name).map(Value::to_display_string)
    }

    /// Required string field.
    pub fn req_str(&self, name: &str) -> Result<String> {
        self.opt_str(name)
            .ok_or_else(|| Error::Decode(format!("missing field {name:?}")))
    }

    /// Boolean field; absent reads as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn opt_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn opt_datetime(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(Value::as_datetime)
    }

    pub fn list(&self, name: &str) -> Vec<Value> {
        self.get(name).cloned().map(Value::into_list).unwrap_or_default()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.fields {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{k}={}", v.to_display_string())?;
        }
        Ok(())
    }
}

/// Interpret a value as a record, failing with a decode error otherwise.
pub fn expect_record(value: Value, what: &str) -> Result<Record> {
    match value {
        Value::Record(r) => Ok(r),
        other => Err(Error::Decode(format!("expected {what} record, got {other:?}"))),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Timestamps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse an `xsd:dateTime` or XML-RPC `dateTime.iso8601` value.
///
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y%m%dT%H:%M:%S", "%Y%m%dT%H%M%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|n| n.and_utc())
        })
        .map(|d| d.trunc_subsecs(0))
}

/// Parse a CDP2 timestamp such as `Thu Jun 27 2013 02:03:33 EDT`.
///
/// Zone abbreviations are ambiguous, so the trailing zone is dropped and the
/// wall-clock time is taken as UTC.
pub fn parse_legacy_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    let without_zone = match s.rsplit_once(' ') {
        Some((head, tail)) if tail.chars().all(|c| c.is_ascii_alphabetic()) => head,
        _ => s,
    };
    NaiveDateTime::parse_from_str(without_zone, "%a %b %d %Y %H:%M:%S")
        .ok()
        .map(|n| n.and_utc())
}
