use serde::Serialize;

/// Structured trace events emitted across all cdptool crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    NamespaceConnected {
        server: String,
        namespace: String,
        duration_ms: u64,
    },
    RemoteCall {
        server: String,
        namespace: String,
        operation: String,
        attempt: u32,
        duration_ms: u64,
        ok: bool,
    },
    CallRetried {
        server: String,
        namespace: String,
        operation: String,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    ServerHandled {
        run_id: String,
        server: String,
        version: u8,
        ok: bool,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "cdp_event");
    }
}
