//! Lazily-built, per-client cache of namespace handles.
//!
//! Each namespace handle stacks three layers around one transport:
//!
//! ```text
//! call ─▶ Retrier ─▶ RateLimiter ─▶ Transport ─▶ remote service
//! ```
//!
//! Retries go around the rate limiter, so a retried attempt still waits its
//! turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use cdp_domain::error::Result;
use cdp_domain::settings::ClientSettings;
use cdp_domain::trace::TraceEvent;

use crate::limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::transport::{Connector, Transport};
use crate::value::{Record, Value};

/// Pacing and retry applied to every handle a cache builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub min_interval: Duration,
    pub retry: RetryPolicy,
}

impl CallPolicy {
    pub fn new(min_interval: Duration, max_attempts: u32) -> Self {
        Self {
            min_interval,
            retry: RetryPolicy::new(max_attempts),
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::new(Duration::ZERO, 3)
    }
}

impl From<&ClientSettings> for CallPolicy {
    fn from(settings: &ClientSettings) -> Self {
        Self::new(settings.min_interval(), settings.max_attempts)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NamespaceHandle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The wrapped client for one (server, namespace) pair.
pub struct NamespaceHandle {
    server: String,
    namespace: String,
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl NamespaceHandle {
    pub fn new(
        server: impl Into<String>,
        namespace: impl Into<String>,
        transport: Arc<dyn Transport>,
        policy: CallPolicy,
    ) -> Self {
        Self {
            server: server.into(),
            namespace: namespace.into(),
            transport,
            limiter: RateLimiter::new(policy.min_interval),
            retry: policy.retry,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Invoke a remote operation through the retry and pacing layers.
    pub async fn call(&self, operation: &str, params: Record) -> Result<Value> {
        let params = &params;
        self.retry
            .run(
                |attempt| async move {
                    let start = Instant::now();
                    let result = self
                        .limiter
                        .run(|| self.transport.call(operation, params))
                        .await;
                    TraceEvent::RemoteCall {
                        server: self.server.clone(),
                        namespace: self.namespace.clone(),
                        operation: operation.to_owned(),
                        attempt,
                        duration_ms: start.elapsed().as_millis() as u64,
                        ok: result.is_ok(),
                    }
                    .emit();
                    result
                },
                |attempt, err| {
                    tracing::warn!(
                        server = %self.server,
                        namespace = %self.namespace,
                        operation,
                        attempt,
                        error = %err,
                        "transient failure, retrying"
                    );
                    TraceEvent::CallRetried {
                        server: self.server.clone(),
                        namespace: self.namespace.clone(),
                        operation: operation.to_owned(),
                        attempt,
                        max_attempts: self.retry.max_attempts(),
                        error: err.to_string(),
                    }
                    .emit();
                },
            )
            .await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NamespaceClientCache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One lazily-constructed handle per namespace name, owned by one client.
///
/// Construction is single-winner: concurrent first accesses to the same
/// namespace share one connect attempt. A failed construction leaves the
/// slot empty, so a later `get` tries again.
pub struct NamespaceClientCache {
    connector: Arc<dyn Connector>,
    policy: CallPolicy,
    slots: Mutex<HashMap<String, Arc<OnceCell<Arc<NamespaceHandle>>>>>,
}

impl NamespaceClientCache {
    pub fn new(connector: Arc<dyn Connector>, policy: CallPolicy) -> Self {
        Self {
            connector,
            policy,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn server(&self) -> &str {
        self.connector.server()
    }

    /// Return the handle for `namespace`, connecting on first access.
    pub async fn get(&self, namespace: &str) -> Result<Arc<NamespaceHandle>> {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(namespace.to_owned()).or_default().clone()
        };

        slot.get_or_try_init(|| async {
            tracing::debug!(server = %self.server(), namespace, "connecting namespace client");
            let transport = self.connector.connect(namespace).await?;
            Ok(Arc::new(NamespaceHandle::new(
                self.server(),
                namespace,
                transport,
                self.policy,
            )))
        })
        .await
        .cloned()
    }

    /// Names of namespaces with a live handle.
    pub fn connected(&self) -> Vec<String> {
        let slots = self.slots.lock();
        let mut names: Vec<String> = slots
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}
