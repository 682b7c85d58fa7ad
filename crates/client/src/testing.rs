//! In-memory connector for exercising clients and handlers without a
//! server.
//!
//! Answers are scripted per `(namespace, operation)`. Every call is
//! recorded, one-shot failures can be queued ahead of the scripted answer,
//! and whole namespaces can be made unreachable.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use cdp_domain::error::{Error, Result};
use cdp_domain::ServerDescriptor;

use crate::factory::ClientFactory;
use crate::legacy::LegacyClient;
use crate::namespace::CallPolicy;
use crate::services::CdpClient;
use crate::transport::{Connector, Transport};
use crate::value::{Record, Value};

type Responder = Arc<dyn Fn(&Record) -> Result<Value> + Send + Sync>;
type Key = (String, String);

/// A call observed by a [`ScriptedConnector`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub namespace: String,
    pub operation: String,
    pub params: Record,
}

#[derive(Default)]
struct Script {
    responders: HashMap<Key, Responder>,
    failures: HashMap<Key, VecDeque<Error>>,
    refused: HashSet<String>,
    calls: Vec<RecordedCall>,
    connects: Vec<String>,
}

#[derive(Clone)]
pub struct ScriptedConnector {
    label: String,
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            script: Arc::default(),
        }
    }

    /// Always answer `operation` with `value`.
    pub fn on(&self, namespace: &str, operation: &str, value: impl Into<Value>) -> &Self {
        let value = value.into();
        self.on_call(namespace, operation, move |_| Ok(value.clone()))
    }

    /// Answer `operation` from its parameters.
    pub fn on_call<F>(&self, namespace: &str, operation: &str, f: F) -> &Self
    where
        F: Fn(&Record) -> Result<Value> + Send + Sync + 'static,
    {
        self.script
            .lock()
            .responders
            .insert(key(namespace, operation), Arc::new(f));
        self
    }

    /// Fail the next call to `operation` with `err`, ahead of any scripted
    /// answer. Queued failures are consumed in order.
    pub fn fail_next(&self, namespace: &str, operation: &str, err: Error) -> &Self {
        self.script
            .lock()
            .failures
            .entry(key(namespace, operation))
            .or_default()
            .push_back(err);
        self
    }

    /// Make connecting `namespace` fail.
    pub fn refuse(&self, namespace: &str) -> &Self {
        self.script.lock().refused.insert(namespace.to_owned());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().calls.clone()
    }

    /// Calls made to one operation, in order.
    pub fn calls_to(&self, namespace: &str, operation: &str) -> Vec<Record> {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|c| c.namespace == namespace && c.operation == operation)
            .map(|c| c.params.clone())
            .collect()
    }

    /// Namespaces connected so far, in connect order.
    pub fn connects(&self) -> Vec<String> {
        self.script.lock().connects.clone()
    }
}

fn key(namespace: &str, operation: &str) -> Key {
    (namespace.to_owned(), operation.to_owned())
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn server(&self) -> &str {
        &self.label
    }

    async fn connect(&self, namespace: &str) -> Result<Arc<dyn Transport>> {
        let mut script = self.script.lock();
        script.connects.push(namespace.to_owned());
        if script.refused.contains(namespace) {
            return Err(Error::Connect {
                namespace: namespace.to_owned(),
                message: format!("{} refused the connection", self.label),
            });
        }
        Ok(Arc::new(ScriptedTransport {
            namespace: namespace.to_owned(),
            script: self.script.clone(),
        }))
    }
}

struct ScriptedTransport {
    namespace: String,
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, operation: &str, params: &Record) -> Result<Value> {
        let k = key(&self.namespace, operation);
        let responder = {
            let mut script = self.script.lock();
            script.calls.push(RecordedCall {
                namespace: self.namespace.clone(),
                operation: operation.to_owned(),
                params: params.clone(),
            });
            if let Some(err) = script.failures.get_mut(&k).and_then(VecDeque::pop_front) {
                return Err(err);
            }
            script.responders.get(&k).cloned()
        };
        match responder {
            Some(f) => f(params),
            None => Err(Error::Fault {
                code: "soap:Client".into(),
                message: format!("no scripted answer for {}.{operation}", self.namespace),
            }),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ScriptedFactory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hands out clients backed by one [`ScriptedConnector`] per hostname.
///
/// Clients built for the same hostname share the script, so every client
/// of a server observes the same answers and records into the same log.
/// Hostnames without a script fail to build.
#[derive(Default)]
pub struct ScriptedFactory {
    servers: Mutex<HashMap<String, ScriptedConnector>>,
    policy: CallPolicy,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The script for `hostname`, created on first use.
    pub fn server(&self, hostname: &str) -> ScriptedConnector {
        self.servers
            .lock()
            .entry(hostname.to_owned())
            .or_insert_with(|| ScriptedConnector::new(hostname))
            .clone()
    }

    fn connector(&self, server: &ServerDescriptor) -> Result<ScriptedConnector> {
        self.servers
            .lock()
            .get(&server.hostname)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("{}: no route to host", server.hostname)))
    }
}

impl ClientFactory for ScriptedFactory {
    fn cdp(&self, server: &ServerDescriptor) -> Result<CdpClient> {
        let connector = self.connector(server)?;
        Ok(CdpClient::with_connector(Arc::new(connector), self.policy))
    }

    fn legacy(&self, server: &ServerDescriptor) -> Result<LegacyClient> {
        let connector = self.connector(server)?;
        Ok(LegacyClient::with_connector(Arc::new(connector), self.policy))
    }
}
