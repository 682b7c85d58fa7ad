//! Route an operation across servers of different API generations.
//!
//! A [`VersionDispatcher`] maps protocol versions to handlers and runs them
//! over a server list on a bounded number of concurrent workers. Every
//! server yields exactly one [`DispatchOutcome`]; a failing or panicking
//! handler never stops the others.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::task::{JoinError, JoinHandle};

use cdp_domain::error::{Error, Result};
use cdp_domain::trace::TraceEvent;
use cdp_domain::{ProtocolVersion, ServerDescriptor};

/// Handlers for distinct servers never share state, so each gets its own
/// descriptor by value.
pub type Handler<T> = Arc<dyn Fn(ServerDescriptor) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Result of one server's handler, tagged with the server it ran for.
#[derive(Debug)]
pub struct DispatchOutcome<T> {
    pub server: ServerDescriptor,
    pub result: Result<T>,
}

impl<T> DispatchOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub const DEFAULT_WORKERS: usize = 4;

/// Spawned handler that is cancelled when its outcome is no longer awaited,
/// so dropping a dispatch stream early leaves no detached calls behind.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<T> Future for AbortOnDrop<T> {
    type Output = std::result::Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

pub struct VersionDispatcher<T> {
    handlers: HashMap<ProtocolVersion, Handler<T>>,
    fallback: Option<Handler<T>>,
    workers: usize,
    run_id: String,
}

impl<T: Send + 'static> Default for VersionDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> VersionDispatcher<T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
            workers: DEFAULT_WORKERS,
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Concurrent handler limit; values below one are raised to one.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Register `handler` for each of `versions`, replacing earlier entries.
    pub fn on<F, Fut>(mut self, versions: &[ProtocolVersion], handler: F) -> Self
    where
        F: Fn(ServerDescriptor) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let handler: Handler<T> = Arc::new(move |server| Box::pin(handler(server)));
        for v in versions {
            self.handlers.insert(*v, handler.clone());
        }
        self
    }

    /// Handler for versions without an explicit entry. Without one,
    /// unmapped versions fail with [`Error::UnsupportedVersion`].
    pub fn fallback<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ServerDescriptor) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move |server| Box::pin(handler(server))));
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn handler_for(&self, version: ProtocolVersion) -> Option<Handler<T>> {
        self.handlers
            .get(&version)
            .or(self.fallback.as_ref())
            .cloned()
    }

    /// Run the handler for one server.
    ///
    /// The handler runs on its own task so that a panic is contained and
    /// reported as that server's failure. Dropping the returned future
    /// aborts that task.
    fn run_one(&self, server: ServerDescriptor) -> impl Future<Output = DispatchOutcome<T>> {
        let handler = self.handler_for(server.protocol_version);
        let run_id = self.run_id.clone();
        async move {
            let start = Instant::now();
            let version = server.protocol_version;
            let result = match handler {
                Some(handler) => AbortOnDrop(tokio::spawn(handler(server.clone())))
                    .await
                    .unwrap_or_else(|e| Err(Error::Other(format!("handler panicked: {e}")))),
                None => Err(Error::UnsupportedVersion(version.as_u8())),
            };

            match &result {
                Ok(_) => tracing::debug!(server = %server.hostname, %version, "server handled"),
                Err(e) => tracing::warn!(
                    server = %server.hostname,
                    %version,
                    error = %e,
                    "server handler failed"
                ),
            }
            TraceEvent::ServerHandled {
                run_id,
                server: server.hostname.clone(),
                version: version.as_u8(),
                ok: result.is_ok(),
                duration_ms: start.elapsed().as_millis() as u64,
            }
            .emit();

            DispatchOutcome { server, result }
        }
    }

    /// Lazily run every server's handler, yielding outcomes as they
    /// complete. Nothing starts until the stream is polled.
    pub fn dispatch<'a, I>(&'a self, servers: I) -> impl Stream<Item = DispatchOutcome<T>> + 'a
    where
        I: IntoIterator<Item = ServerDescriptor>,
        I::IntoIter: 'a,
    {
        stream::iter(servers)
            .map(move |server| self.run_one(server))
            .buffer_unordered(self.workers)
    }

    /// Run every server's handler and return the outcomes in input order.
    pub async fn dispatch_ordered<I>(&self, servers: I) -> Vec<DispatchOutcome<T>>
    where
        I: IntoIterator<Item = ServerDescriptor>,
    {
        stream::iter(servers)
            .map(|server| self.run_one(server))
            .buffered(self.workers)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn server(version: ProtocolVersion, hostname: &str) -> ServerDescriptor {
        ServerDescriptor::with_default_port(version, hostname, true, "admin", "secret")
    }

    fn echo_dispatcher() -> VersionDispatcher<String> {
        VersionDispatcher::new()
            .on(&[ProtocolVersion::V2], |s| async move { Ok(format!("v2:{}", s.hostname)) })
            .on(&[ProtocolVersion::V3, ProtocolVersion::V5], |s| async move {
                Ok(format!("soap:{}", s.hostname))
            })
    }

    #[tokio::test]
    async fn routes_by_version() {
        let outcomes = echo_dispatcher()
            .dispatch_ordered(vec![
                server(ProtocolVersion::V2, "a"),
                server(ProtocolVersion::V5, "b"),
            ])
            .await;
        assert_eq!(outcomes[0].result.as_deref().unwrap(), "v2:a");
        assert_eq!(outcomes[1].result.as_deref().unwrap(), "soap:b");
    }

    #[tokio::test]
    async fn unmapped_version_is_unsupported() {
        let outcomes = echo_dispatcher()
            .dispatch_ordered(vec![server(ProtocolVersion::V4, "c")])
            .await;
        match &outcomes[0].result {
            Err(Error::UnsupportedVersion(4)) => {}
            other => panic!("expected unsupported version, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fallback_covers_unmapped_versions() {
        let outcomes = echo_dispatcher()
            .fallback(|s| async move { Ok(format!("default:{}", s.protocol_version)) })
            .dispatch_ordered(vec![server(ProtocolVersion::V4, "c")])
            .await;
        assert_eq!(outcomes[0].result.as_deref().unwrap(), "default:CDP4");
    }

    #[tokio::test]
    async fn partial_failure_is_reported_per_server() {
        let dispatcher = VersionDispatcher::new().on(&ProtocolVersion::ALL, |s| async move {
            if s.hostname == "b" {
                Err(Error::Fault {
                    code: "soap:Server".into(),
                    message: "invalid policy ID".into(),
                })
            } else {
                Ok(s.hostname)
            }
        });
        let servers = ["a", "b", "c"].map(|h| server(ProtocolVersion::V3, h));

        let outcomes: Vec<_> = dispatcher.dispatch(servers).collect().await;
        assert_eq!(outcomes.len(), 3);
        for o in &outcomes {
            assert_eq!(o.is_ok(), o.server.hostname != "b", "{}", o.server.hostname);
        }
    }

    #[tokio::test]
    async fn panicking_handler_does_not_abort_batch() {
        let dispatcher = VersionDispatcher::new().on(&ProtocolVersion::ALL, |s| async move {
            if s.hostname == "boom" {
                panic!("handler bug");
            }
            Ok(())
        });
        let outcomes = dispatcher
            .dispatch_ordered(vec![
                server(ProtocolVersion::V3, "boom"),
                server(ProtocolVersion::V3, "fine"),
            ])
            .await;
        assert!(matches!(outcomes[0].result, Err(Error::Other(_))));
        assert!(outcomes[1].is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded_by_workers() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let dispatcher = {
            let (running, peak) = (running.clone(), peak.clone());
            VersionDispatcher::new()
                .workers(2)
                .on(&ProtocolVersion::ALL, move |_| {
                    let (running, peak) = (running.clone(), peak.clone());
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
        };
        let servers: Vec<_> = (0..6)
            .map(|i| server(ProtocolVersion::V3, &format!("h{i}")))
            .collect();

        let outcomes: Vec<_> = dispatcher.dispatch(servers).collect().await;
        assert_eq!(outcomes.len(), 6);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_stream_cancels_running_handlers() {
        let finished = Arc::new(AtomicUsize::new(0));
        let dispatcher = {
            let finished = finished.clone();
            VersionDispatcher::new()
                .workers(2)
                .on(&ProtocolVersion::ALL, move |s| {
                    let finished = finished.clone();
                    async move {
                        if s.hostname == "slow" {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            finished.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(s.hostname)
                    }
                })
        };
        let servers = ["slow", "fast"].map(|h| server(ProtocolVersion::V3, h));

        {
            let mut outcomes = std::pin::pin!(dispatcher.dispatch(servers));
            let first = outcomes.next().await.unwrap();
            assert_eq!(first.server.hostname, "fast");
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ordered_dispatch_keeps_input_order() {
        let dispatcher = VersionDispatcher::new().on(&ProtocolVersion::ALL, |s| async move {
            // Earlier servers finish later.
            let delay = 30 - s.port as u64 % 30;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(s.hostname)
        });
        let servers: Vec<_> = (0..4)
            .map(|i| {
                let mut s = server(ProtocolVersion::V3, &format!("h{i}"));
                s.port = i;
                s
            })
            .collect();

        let names: Vec<String> = dispatcher
            .dispatch_ordered(servers)
            .await
            .into_iter()
            .map(|o| o.result.unwrap())
            .collect();
        assert_eq!(names, ["h0", "h1", "h2", "h3"]);
    }
}
