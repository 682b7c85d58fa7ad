//! SOAP 1.1 document/literal transport for CDP3+ namespaces.
//!
//! Each namespace (`Agent`, `Policy2`, …) is its own endpoint described by a
//! WSDL at `{proto}://{host}:{port}/{namespace}?wsdl`. Connecting fetches the
//! WSDL to learn the target namespace and service address; calls POST an
//! envelope and read the `return` elements of the response wrapper.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use cdp_domain::error::{Error, Result};
use cdp_domain::trace::TraceEvent;
use cdp_domain::ServerDescriptor;

use crate::http::{from_reqwest, status_error};
use crate::transport::{Connector, Transport};
use crate::value::{Record, Value};
use crate::xml::{self, Element};

const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Codec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What a WSDL tells us about a namespace endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescription {
    pub target_namespace: String,
    pub location: Option<String>,
}

/// Extract the target namespace and `soap:address` location from a WSDL.
pub fn parse_wsdl(doc: &str) -> Result<ServiceDescription> {
    let root = xml::parse(doc)?;
    if root.name != "definitions" {
        return Err(Error::Decode(format!(
            "expected WSDL definitions, found <{}>",
            root.name
        )));
    }
    let target_namespace = root
        .attr("targetNamespace")
        .ok_or_else(|| Error::Decode("WSDL has no targetNamespace".into()))?
        .to_owned();
    let location = root
        .find("address")
        .and_then(|a| a.attr("location"))
        .map(str::to_owned);
    Ok(ServiceDescription {
        target_namespace,
        location,
    })
}

fn encode_value(name: &str, value: &Value, out: &mut String) {
    match value {
        Value::Nil => {}
        Value::List(items) => {
            for item in items {
                encode_value(name, item, out);
            }
        }
        Value::Record(record) => {
            out.push('<');
            out.push_str(name);
            out.push('>');
            for (field, v) in record.iter() {
                encode_value(field, v, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        scalar => {
            out.push('<');
            out.push_str(name);
            out.push('>');
            out.push_str(&xml::escape(&scalar.to_display_string()));
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
}

/// Build a request envelope for `operation` in `target_namespace`.
pub fn encode_request(target_namespace: &str, operation: &str, params: &Record) -> String {
    let mut body = String::new();
    for (name, value) in params.iter() {
        encode_value(name, value, &mut body);
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<soapenv:Envelope xmlns:soapenv=\"{ENVELOPE_NS}\" xmlns:ns=\"{ns}\">\
<soapenv:Body><ns:{operation}>{body}</ns:{operation}></soapenv:Body>\
</soapenv:Envelope>",
        ns = xml::escape(target_namespace),
    )
}

/// Convert a response element into a [`Value`].
///
/// Leaves become strings, elements with children become records, and
/// repeated child names collapse into lists.
fn element_to_value(el: &Element) -> Value {
    if el.is_nil() {
        return Value::Nil;
    }
    if el.children.is_empty() {
        return if el.text.is_empty() {
            Value::Nil
        } else {
            Value::Str(el.text.clone())
        };
    }

    let mut record = Record::new();
    let mut seen: Vec<&str> = Vec::new();
    for child in &el.children {
        if seen.contains(&child.name.as_str()) {
            continue;
        }
        seen.push(&child.name);
        let same: Vec<&Element> = el.children_named(&child.name).collect();
        let value = if same.len() == 1 {
            element_to_value(same[0])
        } else {
            Value::List(same.into_iter().map(element_to_value).collect())
        };
        record.push(child.name.clone(), value);
    }
    Value::Record(record)
}

fn fault_error(fault: &Element) -> Error {
    let text = |name: &str| {
        fault
            .find(name)
            .map(|e| e.text.trim().to_owned())
            .unwrap_or_default()
    };
    Error::Fault {
        code: text("faultcode"),
        message: text("faultstring"),
    }
}

/// Decode a response envelope into its result value, or the fault it
/// carries.
pub fn decode_response(doc: &str) -> Result<Value> {
    let root = xml::parse(doc)?;
    let body = root
        .child("Body")
        .ok_or_else(|| Error::Decode("SOAP envelope has no Body".into()))?;
    let wrapper = match body.children.first() {
        Some(w) => w,
        None => return Ok(Value::Nil),
    };
    if wrapper.name == "Fault" {
        return Err(fault_error(wrapper));
    }

    let returns: Vec<&Element> = wrapper.children_named("return").collect();
    Ok(match returns.len() {
        0 => Value::Nil,
        1 => element_to_value(returns[0]),
        _ => Value::List(returns.into_iter().map(element_to_value).collect()),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Builds SOAP transports for every namespace of one CDP3+ server.
pub struct SoapConnector {
    http: Client,
    server: ServerDescriptor,
}

impl SoapConnector {
    pub fn new(http: Client, server: ServerDescriptor) -> Self {
        Self { http, server }
    }
}

#[async_trait]
impl Connector for SoapConnector {
    fn server(&self) -> &str {
        &self.server.hostname
    }

    async fn connect(&self, namespace: &str) -> Result<Arc<dyn Transport>> {
        let start = Instant::now();
        let wsdl_url = self.server.wsdl_url(namespace);
        let connect_err = |message: String| Error::Connect {
            namespace: namespace.to_owned(),
            message,
        };

        let resp = self
            .http
            .get(&wsdl_url)
            .basic_auth(&self.server.username, Some(&self.server.password))
            .send()
            .await
            .map_err(|e| connect_err(format!("fetching {wsdl_url}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| connect_err(format!("reading {wsdl_url}: {e}")))?;
        if !status.is_success() {
            return Err(match status_error(namespace, status, &body) {
                auth @ Error::Auth(_) => auth,
                other => connect_err(other.to_string()),
            });
        }

        let description =
            parse_wsdl(&body).map_err(|e| connect_err(format!("{wsdl_url}: {e}")))?;
        let endpoint = description
            .location
            .unwrap_or_else(|| self.server.soap_endpoint(namespace));

        TraceEvent::NamespaceConnected {
            server: self.server.hostname.clone(),
            namespace: namespace.to_owned(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();
        tracing::debug!(namespace, %endpoint, "SOAP namespace ready");

        Ok(Arc::new(SoapTransport {
            http: self.http.clone(),
            endpoint,
            target_namespace: description.target_namespace,
            username: self.server.username.clone(),
            password: self.server.password.clone(),
            namespace: namespace.to_owned(),
        }))
    }
}

/// A SOAP client bound to one namespace endpoint.
pub struct SoapTransport {
    http: Client,
    endpoint: String,
    target_namespace: String,
    username: String,
    password: String,
    namespace: String,
}

#[async_trait]
impl Transport for SoapTransport {
    async fn call(&self, operation: &str, params: &Record) -> Result<Value> {
        let envelope = encode_request(&self.target_namespace, operation, params);
        let resp = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", "\"\"")
            .body(envelope)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let body = resp.text().await.map_err(from_reqwest)?;
        let decoded = decode_response(&body);
        if status.is_success() {
            return decoded;
        }
        // Faults arrive as HTTP 500; keep them as application faults.
        match decoded {
            Err(fault @ Error::Fault { .. }) => Err(fault),
            _ => Err(status_error(
                &format!("{}.{operation}", self.namespace),
                status,
                &body,
            )),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wsdl_yields_namespace_and_address() {
        let wsdl = r#"<?xml version="1.0"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
    xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    targetNamespace="http://policy2.api.server.backup.r1soft.com/" name="Policy2">
  <service name="Policy2">
    <port name="Policy2Port" binding="tns:Policy2PortBinding">
      <soap:address location="https://cdp1:9443/Policy2"/>
    </port>
  </service>
</definitions>"#;
        let desc = parse_wsdl(wsdl).unwrap();
        assert_eq!(
            desc.target_namespace,
            "http://policy2.api.server.backup.r1soft.com/"
        );
        assert_eq!(desc.location.as_deref(), Some("https://cdp1:9443/Policy2"));
    }

    #[test]
    fn non_wsdl_document_is_rejected() {
        assert!(parse_wsdl("<html><body>login</body></html>").is_err());
    }

    #[test]
    fn request_omits_nil_and_repeats_lists() {
        let policy = Record::new()
            .with("id", Value::Nil)
            .with("name", "web & db")
            .with(
                "databaseInstanceList",
                Value::List(vec![
                    Record::new().with("name", "a").into(),
                    Record::new().with("name", "b").into(),
                ]),
            );
        let params = Record::new().with("policy", policy);
        let env = encode_request("urn:p", "createPolicy", &params);

        assert!(env.contains("<ns:createPolicy><policy><name>web &amp; db</name>"));
        assert!(!env.contains("<id>"));
        assert_eq!(env.matches("<databaseInstanceList>").count(), 2);
        assert!(env.contains("xmlns:ns=\"urn:p\""));
    }

    #[test]
    fn response_returns_collapse_to_list() {
        let doc = r#"<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body>
<ns2:getPoliciesResponse xmlns:ns2="urn:p">
  <return><id>p1</id><enabled>true</enabled></return>
  <return><id>p2</id><enabled>false</enabled><description/></return>
</ns2:getPoliciesResponse></S:Body></S:Envelope>"#;
        let items = decode_response(doc).unwrap().into_list();
        assert_eq!(items.len(), 2);
        let second = items[1].as_record().unwrap();
        assert_eq!(second.opt_str("id").as_deref(), Some("p2"));
        assert!(!second.flag("enabled"));
        assert!(second.get("description").is_none());
    }

    #[test]
    fn empty_wrapper_is_nil() {
        let doc = r#"<S:Envelope xmlns:S="x"><S:Body><ns2:updatePolicyResponse xmlns:ns2="y"/></S:Body></S:Envelope>"#;
        assert_eq!(decode_response(doc).unwrap(), Value::Nil);
    }

    #[test]
    fn fault_becomes_application_error() {
        let doc = r#"<S:Envelope xmlns:S="x"><S:Body><S:Fault>
<faultcode>S:Server</faultcode><faultstring>Invalid policy ID</faultstring>
</S:Fault></S:Body></S:Envelope>"#;
        let err = decode_response(doc).unwrap_err();
        match &err {
            Error::Fault { code, message } => {
                assert_eq!(code, "S:Server");
                assert_eq!(message, "Invalid policy ID");
            }
            other => panic!("expected fault, got {other:?}"),
        }
        assert!(!err.is_transient());
    }
}
