/// Shared error type used across all cdptool crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("connect {namespace}: {message}")]
    Connect { namespace: String, message: String },

    #[error("transport: {0}")]
    Transport(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("remote fault {code}: {message}")]
    Fault { code: String, message: String },

    #[error("decode: {0}")]
    Decode(String),

    #[error("unsupported version: CDP{0}")]
    UnsupportedVersion(u8),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the failure belongs to the network/connection layer and the
    /// same request may be sent again.
    ///
    /// Application faults, auth failures and decode errors are never
    /// transient: resubmitting them would either fail identically or repeat
    /// a non-idempotent mutation.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }

    /// Short label used in report tables.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "IoError",
            Error::Config(_) => "ConfigError",
            Error::Connect { .. } => "ConnectError",
            Error::Transport(_) => "TransportError",
            Error::Timeout(_) => "Timeout",
            Error::Auth(_) => "AuthError",
            Error::Http { .. } => "HttpError",
            Error::Fault { .. } => "WebFault",
            Error::Decode(_) => "DecodeError",
            Error::UnsupportedVersion(_) => "UnsupportedVersion",
            Error::NotFound(_) => "NotFound",
            Error::Other(_) => "Error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_and_timeout_are_transient() {
        assert!(Error::Transport("connection reset".into()).is_transient());
        assert!(Error::Timeout("30s elapsed".into()).is_transient());

        assert!(!Error::Fault {
            code: "soap:Server".into(),
            message: "invalid policy ID".into()
        }
        .is_transient());
        assert!(!Error::Auth("401".into()).is_transient());
        assert!(!Error::Http {
            status: 500,
            message: "boom".into()
        }
        .is_transient());
        assert!(!Error::Connect {
            namespace: "Agent".into(),
            message: "unreachable".into()
        }
        .is_transient());
    }

    #[test]
    fn unsupported_version_display_names_generation() {
        let err = Error::UnsupportedVersion(2);
        assert_eq!(err.to_string(), "unsupported version: CDP2");
        assert_eq!(err.kind(), "UnsupportedVersion");
    }
}
