use std::time::Duration;

use cdp_domain::settings::{LogFormat, Settings, TlsVersion};

#[test]
fn defaults_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::load_or_default(dir.path().join("missing.toml")).unwrap();
    assert_eq!(settings.client.max_attempts, 3);
    assert_eq!(settings.client.min_interval(), Duration::ZERO);
    assert_eq!(settings.client.tls_version, TlsVersion::Auto);
    assert_eq!(settings.dispatch.workers, 4);
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cdptool.toml");
    std::fs::write(
        &path,
        r#"
[client]
min_interval_ms = 250
tls_version = "tls1_2"

[logging]
format = "json"
"#,
    )
    .unwrap();

    let settings = Settings::load_or_default(&path).unwrap();
    assert_eq!(settings.client.min_interval(), Duration::from_millis(250));
    assert_eq!(settings.client.tls_version, TlsVersion::Tls12);
    assert_eq!(settings.client.max_attempts, 3);
    assert_eq!(settings.logging.format, LogFormat::Json);
    assert_eq!(settings.dispatch.workers, 4);
}

#[test]
fn zero_attempts_is_rejected() {
    let err = Settings::from_toml("[client]\nmax_attempts = 0\n").unwrap_err();
    assert!(err.to_string().contains("max_attempts"));
}

#[test]
fn zero_workers_is_rejected() {
    assert!(Settings::from_toml("[dispatch]\nworkers = 0\n").is_err());
}

#[test]
fn server_list_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("servers.conf");
    std::fs::write(
        &path,
        "3:host-a:9443:1:admin:secret\n2:host-b:8085:0:admin:secret\n",
    )
    .unwrap();

    let servers = cdp_domain::server::load_servers(&path).unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[1].hostname, "host-b");
}

#[test]
fn missing_server_list_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = cdp_domain::server::load_servers(dir.path().join("nope")).unwrap_err();
    assert_eq!(err.kind(), "ConfigError");
}
