//! Server descriptors and the colon-delimited server list format.
//!
//! One line per backup server:
//!
//! ```text
//! # version:hostname:port:use_tls:username:password
//! 3:host-a:9443:1:admin:secret
//! 2:host-b:8085:0:admin:secret
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Any malformed line
//! rejects the whole file.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default SOAP ports (CDP3 and newer).
pub const SOAP_PORT_HTTPS: u16 = 9443;
pub const SOAP_PORT_HTTP: u16 = 9080;

/// Default XML-RPC ports (CDP2).
pub const XMLRPC_PORT_HTTPS: u16 = 8085;
pub const XMLRPC_PORT_HTTP: u16 = 8084;

/// Web UI ports used for report links.
pub const WEB_PORT_HTTPS: u16 = 8001;
pub const WEB_PORT_HTTP: u16 = 8000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProtocolVersion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// API generation of a backup server.
///
/// CDP2 speaks XML-RPC with a flat host/task model; CDP3 and newer speak
/// SOAP with the agent/disk-safe/policy object graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    V2,
    V3,
    V4,
    V5,
}

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 4] = [
        ProtocolVersion::V2,
        ProtocolVersion::V3,
        ProtocolVersion::V4,
        ProtocolVersion::V5,
    ];

    pub fn as_u8(self) -> u8 {
        match self {
            ProtocolVersion::V2 => 2,
            ProtocolVersion::V3 => 3,
            ProtocolVersion::V4 => 4,
            ProtocolVersion::V5 => 5,
        }
    }

    /// Whether this generation uses the SOAP namespace endpoints.
    pub fn is_soap(self) -> bool {
        self != ProtocolVersion::V2
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            2 => Ok(ProtocolVersion::V2),
            3 => Ok(ProtocolVersion::V3),
            4 => Ok(ProtocolVersion::V4),
            5 => Ok(ProtocolVersion::V5),
            other => Err(Error::Config(format!(
                "protocol version must be 2, 3, 4 or 5 (got {other})"
            ))),
        }
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(v: ProtocolVersion) -> u8 {
        v.as_u8()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CDP{}", self.as_u8())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ServerDescriptor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One remote backup server. Immutable once loaded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub protocol_version: ProtocolVersion,
    pub hostname: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: String,
    pub password: String,
}

impl ServerDescriptor {
    /// Build a descriptor on the default API port for its generation.
    pub fn with_default_port(
        protocol_version: ProtocolVersion,
        hostname: impl Into<String>,
        use_tls: bool,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let port = match (protocol_version.is_soap(), use_tls) {
            (true, true) => SOAP_PORT_HTTPS,
            (true, false) => SOAP_PORT_HTTP,
            (false, true) => XMLRPC_PORT_HTTPS,
            (false, false) => XMLRPC_PORT_HTTP,
        };
        Self {
            protocol_version,
            hostname: hostname.into(),
            port,
            use_tls,
            username: username.into(),
            password: password.into(),
        }
    }

    fn scheme(&self) -> &'static str {
        if self.use_tls {
            "https"
        } else {
            "http"
        }
    }

    /// WSDL location of a SOAP namespace, e.g. `https://host:9443/Agent?wsdl`.
    pub fn wsdl_url(&self, namespace: &str) -> String {
        format!(
            "{}://{}:{}/{}?wsdl",
            self.scheme(),
            self.hostname,
            self.port,
            namespace
        )
    }

    /// Default SOAP endpoint of a namespace when the WSDL names none.
    pub fn soap_endpoint(&self, namespace: &str) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme(),
            self.hostname,
            self.port,
            namespace
        )
    }

    /// The single XML-RPC endpoint of a CDP2 server.
    pub fn xmlrpc_url(&self) -> String {
        format!("{}://{}:{}/xmlrpc", self.scheme(), self.hostname, self.port)
    }

    /// Link to the server's web console.
    pub fn web_link(&self) -> String {
        let port = if self.use_tls {
            WEB_PORT_HTTPS
        } else {
            WEB_PORT_HTTP
        };
        format!("{}://{}:{}/", self.scheme(), self.hostname, port)
    }
}

impl fmt::Debug for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerDescriptor")
            .field("protocol_version", &self.protocol_version)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const FIELD_COUNT: usize = 6;

/// Parse a server list. Fails on the first malformed line.
pub fn parse_servers(raw: &str) -> Result<Vec<ServerDescriptor>> {
    let mut servers = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let server = parse_line(trimmed)
            .map_err(|msg| Error::Config(format!("server list line {}: {msg}", idx + 1)))?;
        servers.push(server);
    }
    Ok(servers)
}

fn parse_line(line: &str) -> std::result::Result<ServerDescriptor, String> {
    let fields: Vec<&str> = line.split(':').map(str::trim).collect();
    if fields.len() != FIELD_COUNT {
        return Err(format!(
            "expected {FIELD_COUNT} colon-separated fields, found {}",
            fields.len()
        ));
    }

    let version: u8 = fields[0]
        .parse()
        .map_err(|_| format!("version is not an integer: {:?}", fields[0]))?;
    let protocol_version = ProtocolVersion::try_from(version).map_err(|e| e.to_string())?;

    let hostname = fields[1];
    if hostname.is_empty() {
        return Err("hostname is empty".into());
    }

    let port: u16 = fields[2]
        .parse()
        .map_err(|_| format!("port is not a valid port number: {:?}", fields[2]))?;

    let use_tls = match fields[3] {
        "0" => false,
        "1" => true,
        other => return Err(format!("use_tls must be 0 or 1, got {other:?}")),
    };

    Ok(ServerDescriptor {
        protocol_version,
        hostname: hostname.to_owned(),
        port,
        use_tls,
        username: fields[4].to_owned(),
        password: fields[5].to_owned(),
    })
}

/// Read and parse a server list file.
pub fn load_servers(path: impl AsRef<Path>) -> Result<Vec<ServerDescriptor>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
    let servers = parse_servers(&raw)?;
    tracing::debug!(path = %path.display(), count = servers.len(), "server list loaded");
    Ok(servers)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_and_skips_comments() {
        let raw = "\
# version:hostname:port:use_tls:username:password
3:host-a:9443:1:admin:secret

2 : host-b : 8085 : 0 : admin : secret
";
        let servers = parse_servers(raw).unwrap();
        assert_eq!(servers.len(), 2);

        assert_eq!(servers[0].protocol_version, ProtocolVersion::V3);
        assert_eq!(servers[0].hostname, "host-a");
        assert_eq!(servers[0].port, 9443);
        assert!(servers[0].use_tls);

        assert_eq!(servers[1].protocol_version, ProtocolVersion::V2);
        assert_eq!(servers[1].hostname, "host-b");
        assert!(!servers[1].use_tls);
        assert_eq!(servers[1].password, "secret");
    }

    #[test]
    fn malformed_line_rejects_whole_file() {
        let raw = "3:host-a:9443:1:admin:secret\n3:host-b:notaport:1:admin:secret\n";
        let err = parse_servers(raw).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn rejects_unknown_version_and_tls_flag() {
        assert!(parse_servers("6:h:9443:1:u:p").is_err());
        assert!(parse_servers("3:h:9443:2:u:p").is_err());
        assert!(parse_servers("3:h:9443:1:u").is_err());
    }

    #[test]
    fn urls_follow_scheme_and_port() {
        let s = ServerDescriptor::with_default_port(ProtocolVersion::V5, "cdp1", true, "admin", "");
        assert_eq!(s.port, SOAP_PORT_HTTPS);
        assert_eq!(s.wsdl_url("Policy2"), "https://cdp1:9443/Policy2?wsdl");
        assert_eq!(s.web_link(), "https://cdp1:8001/");

        let legacy =
            ServerDescriptor::with_default_port(ProtocolVersion::V2, "old", false, "admin", "");
        assert_eq!(legacy.xmlrpc_url(), "http://old:8084/xmlrpc");
        assert_eq!(legacy.web_link(), "http://old:8000/");
    }

    #[test]
    fn debug_redacts_password() {
        let s = ServerDescriptor::with_default_port(ProtocolVersion::V3, "h", true, "u", "hunter2");
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("hunter2"));
    }
}
