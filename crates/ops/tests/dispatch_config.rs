//! End-to-end: server list text through the dispatcher to scripted servers.

use std::sync::Arc;

use cdp_client::testing::ScriptedFactory;
use cdp_client::{ClientFactory, Record, Value};
use cdp_domain::error::Error;
use cdp_domain::server::parse_servers;
use cdp_domain::ProtocolVersion;
use cdp_ops::{ChangePassword, VersionDispatcher};

const MIXED: &str = "\
# version:hostname:port:use_tls:username:password
3:host-a:9443:1:admin:secret

2:host-b:8085:0:admin:secret
";

#[tokio::test]
async fn unmapped_version_fails_only_its_server() {
    let servers = parse_servers(MIXED).unwrap();
    assert_eq!(servers.len(), 2);

    let factory = Arc::new(ScriptedFactory::new());
    factory
        .server("host-a")
        .on("Agent", "getAgents", Record::new().with("id", "1").with("hostname", "web1"));

    let f = factory.clone();
    let dispatcher = VersionDispatcher::new().on(&[ProtocolVersion::V3], move |s| {
        let f = f.clone();
        async move {
            let client = f.cdp(&s)?;
            cdp_ops::list_agents(&client).await
        }
    });

    let outcomes = dispatcher.dispatch_ordered(servers).await;
    assert_eq!(outcomes[0].server.hostname, "host-a");
    assert_eq!(outcomes[0].result.as_ref().unwrap(), &["web1"]);

    assert_eq!(outcomes[1].server.hostname, "host-b");
    let err = outcomes[1].result.as_ref().unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion(2)));
    assert!(err.to_string().contains("unsupported version"));
}

#[tokio::test]
async fn one_unreachable_server_does_not_stop_the_batch() {
    let servers = parse_servers(
        "5:cdp-1:9443:1:admin:pw\n5:cdp-down:9443:1:admin:pw\n4:cdp-3:9443:1:admin:pw\n",
    )
    .unwrap();

    let factory = Arc::new(ScriptedFactory::new());
    for host in ["cdp-1", "cdp-3"] {
        factory
            .server(host)
            .on("User", "getUsers", Record::new().with("id", "7").with("username", "ops"))
            .on("User", "updateUser", Value::Nil);
    }
    // Known to the factory but refusing every namespace.
    factory.server("cdp-down").refuse("User");

    let op = Arc::new(ChangePassword::new(factory.clone(), "ops", "rotated"));
    let outcomes = op.dispatcher(2).dispatch_ordered(servers).await;

    let ok: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.is_ok())
        .map(|o| o.server.hostname.as_str())
        .collect();
    assert_eq!(ok, ["cdp-1", "cdp-3"]);
    assert!(matches!(outcomes[1].result, Err(Error::Connect { .. })));
    assert_eq!(factory.server("cdp-3").calls_to("User", "updateUser").len(), 1);
}
