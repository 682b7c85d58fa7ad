use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Remote client settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Minimum spacing between two calls on one namespace handle.
    /// `0` disables pacing.
    #[serde(default)]
    pub min_interval_ms: u64,
    /// Attempts per call when the transport fails transiently.
    #[serde(default = "d_3")]
    pub max_attempts: u32,
    /// Per-request HTTP timeout.
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub tls_version: TlsVersion,
    /// Accept self-signed server certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// Pin the TLS protocol version negotiated with the backup servers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsVersion {
    /// Let the TLS stack negotiate.
    #[default]
    Auto,
    #[serde(rename = "tls1_2")]
    Tls12,
    #[serde(rename = "tls1_3")]
    Tls13,
}

impl ClientSettings {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            min_interval_ms: 0,
            max_attempts: 3,
            timeout_ms: 30_000,
            tls_version: TlsVersion::Auto,
            accept_invalid_certs: false,
        }
    }
}

fn d_3() -> u32 {
    3
}
fn d_30000() -> u64 {
    30_000
}
