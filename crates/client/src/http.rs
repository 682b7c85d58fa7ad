//! Shared HTTP plumbing for the SOAP and XML-RPC transports.

use reqwest::tls::Version;
use reqwest::{Client, StatusCode};

use cdp_domain::error::{Error, Result};
use cdp_domain::settings::{ClientSettings, TlsVersion};

const BODY_EXCERPT_CHARS: usize = 200;

/// Build the `reqwest::Client` used by every namespace of one server.
pub fn build_client(settings: &ClientSettings) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(settings.timeout())
        .danger_accept_invalid_certs(settings.accept_invalid_certs);

    builder = match settings.tls_version {
        TlsVersion::Auto => builder,
        TlsVersion::Tls12 => builder
            .min_tls_version(Version::TLS_1_2)
            .max_tls_version(Version::TLS_1_2),
        TlsVersion::Tls13 => builder
            .min_tls_version(Version::TLS_1_3)
            .max_tls_version(Version::TLS_1_3),
    };

    builder
        .build()
        .map_err(|e| Error::Other(format!("building HTTP client: {e}")))
}

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeouts become `Error::Timeout`; connection, request and body failures
/// become `Error::Transport`. Both are retryable.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else if e.is_builder() {
        Error::Other(e.to_string())
    } else {
        Error::Transport(e.to_string())
    }
}

/// Classify a non-success HTTP status that carried no protocol fault.
///
/// * 401/403: credentials rejected, permanent.
/// * 502/503/504: gateway or server unavailable, transient.
/// * anything else: permanent.
pub fn status_error(context: &str, status: StatusCode, body: &str) -> Error {
    let excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Auth(format!("{context} rejected credentials ({status})"))
        }
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Error::Transport(format!("{context} returned {status}: {excerpt}"))
        }
        _ => Error::Http {
            status: status.as_u16(),
            message: format!("{context}: {excerpt}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            status_error("Agent", StatusCode::UNAUTHORIZED, ""),
            Error::Auth(_)
        ));
        assert!(status_error("Agent", StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        let err = status_error("Agent", StatusCode::NOT_FOUND, "nope");
        assert!(!err.is_transient());
        assert!(matches!(err, Error::Http { status: 404, .. }));
    }

    #[test]
    fn builds_with_pinned_tls() {
        let settings = ClientSettings {
            tls_version: TlsVersion::Tls12,
            ..ClientSettings::default()
        };
        assert!(build_client(&settings).is_ok());
    }
}
