//! XML-RPC transport for CDP2 servers.
//!
//! CDP2 exposes one endpoint, `{proto}://{host}:{port}/xmlrpc`. Namespaces
//! (`host`, `backupTask`) are method-name prefixes, so connecting a
//! namespace is local and never touches the network.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use cdp_domain::error::{Error, Result};
use cdp_domain::ServerDescriptor;

use crate::http::{from_reqwest, status_error};
use crate::transport::{Connector, Transport};
use crate::value::{Record, Value};
use crate::xml::{self, Element};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Codec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Nil => out.push_str("<nil/>"),
        Value::Bool(b) => {
            out.push_str(if *b { "<boolean>1</boolean>" } else { "<boolean>0</boolean>" })
        }
        Value::Int(i) => out.push_str(&format!("<int>{i}</int>")),
        Value::Double(d) => out.push_str(&format!("<double>{d}</double>")),
        Value::Str(s) => {
            out.push_str("<string>");
            out.push_str(&xml::escape(s));
            out.push_str("</string>");
        }
        Value::DateTime(s) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&xml::escape(s));
            out.push_str("</dateTime.iso8601>");
        }
        Value::List(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Record(record) => {
            out.push_str("<struct>");
            for (name, v) in record.iter() {
                out.push_str("<member><name>");
                out.push_str(&xml::escape(name));
                out.push_str("</name>");
                encode_value(v, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// Build a `methodCall` document. Parameter names are dropped.
pub fn encode_call(method: &str, params: &Record) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    out.push_str(&xml::escape(method));
    out.push_str("</methodName><params>");
    for (_, value) in params.iter() {
        out.push_str("<param>");
        encode_value(value, &mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn decode_value(el: &Element) -> Result<Value> {
    // A <value> with no type element is a string.
    let typed = match el.children.first() {
        Some(t) => t,
        None => return Ok(Value::Str(el.text.clone())),
    };
    let text = typed.text.trim();
    let bad = |what: &str| Error::Decode(format!("invalid XML-RPC {what}: {text:?}"));

    Ok(match typed.name.as_str() {
        "nil" => Value::Nil,
        "boolean" => match text {
            "1" => Value::Bool(true),
            "0" => Value::Bool(false),
            _ => return Err(bad("boolean")),
        },
        "int" | "i4" | "i8" => Value::Int(text.parse().map_err(|_| bad("int"))?),
        "double" => Value::Double(text.parse().map_err(|_| bad("double"))?),
        "string" => Value::Str(typed.text.clone()),
        "dateTime.iso8601" => Value::DateTime(text.to_owned()),
        "base64" => Value::Str(text.to_owned()),
        "array" => {
            let data = typed
                .child("data")
                .ok_or_else(|| Error::Decode("XML-RPC array without <data>".into()))?;
            Value::List(
                data.children_named("value")
                    .map(decode_value)
                    .collect::<Result<_>>()?,
            )
        }
        "struct" => {
            let mut record = Record::new();
            for member in typed.children_named("member") {
                let name = member
                    .child("name")
                    .ok_or_else(|| Error::Decode("XML-RPC member without <name>".into()))?;
                let value = member
                    .child("value")
                    .ok_or_else(|| Error::Decode("XML-RPC member without <value>".into()))?;
                record.push(name.text.clone(), decode_value(value)?);
            }
            Value::Record(record)
        }
        other => return Err(Error::Decode(format!("unknown XML-RPC type <{other}>"))),
    })
}

/// Decode a `methodResponse` into its single result, or the fault it
/// carries.
pub fn decode_response(doc: &str) -> Result<Value> {
    let root = xml::parse(doc)?;
    if root.name != "methodResponse" {
        return Err(Error::Decode(format!(
            "expected methodResponse, found <{}>",
            root.name
        )));
    }

    if let Some(fault) = root.child("fault") {
        let value = fault
            .child("value")
            .ok_or_else(|| Error::Decode("XML-RPC fault without <value>".into()))?;
        let record = decode_value(value)?;
        let record = record.as_record();
        return Err(Error::Fault {
            code: record
                .and_then(|r| r.opt_str("faultCode"))
                .unwrap_or_default(),
            message: record
                .and_then(|r| r.opt_str("faultString"))
                .unwrap_or_default(),
        });
    }

    match root
        .child("params")
        .and_then(|p| p.child("param"))
        .and_then(|p| p.child("value"))
    {
        Some(value) => decode_value(value),
        None => Ok(Value::Nil),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Builds XML-RPC transports for the namespaces of one CDP2 server.
pub struct XmlRpcConnector {
    http: Client,
    server: ServerDescriptor,
}

impl XmlRpcConnector {
    pub fn new(http: Client, server: ServerDescriptor) -> Self {
        Self { http, server }
    }
}

#[async_trait]
impl Connector for XmlRpcConnector {
    fn server(&self) -> &str {
        &self.server.hostname
    }

    async fn connect(&self, namespace: &str) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(XmlRpcTransport {
            http: self.http.clone(),
            url: self.server.xmlrpc_url(),
            username: self.server.username.clone(),
            password: self.server.password.clone(),
            prefix: namespace.to_owned(),
        }))
    }
}

pub struct XmlRpcTransport {
    http: Client,
    url: String,
    username: String,
    password: String,
    prefix: String,
}

#[async_trait]
impl Transport for XmlRpcTransport {
    async fn call(&self, operation: &str, params: &Record) -> Result<Value> {
        let method = format!("{}.{operation}", self.prefix);
        let resp = self
            .http
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "text/xml")
            .body(encode_call(&method, params))
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let body = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(status_error(&method, status, &body));
        }
        decode_response(&body)
    }
}
