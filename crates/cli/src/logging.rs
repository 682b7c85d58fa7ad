use tracing_subscriber::EnvFilter;

use cdp_domain::settings::{LogFormat, LoggingSettings};

/// Initialize stderr-only tracing so reports on stdout stay clean.
///
/// `RUST_LOG` wins over the configured filter.
pub fn init_tracing(logging: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}
