//! Enable or disable the policies of a list of hosts on every server.

use std::sync::Arc;

use cdp_client::ClientFactory;
use cdp_domain::error::{Error, Result};
use cdp_domain::{ProtocolVersion, ServerDescriptor};

use crate::dispatch::VersionDispatcher;

/// Column of the server list CSV holding the hostname.
const HOSTNAME_COLUMN: usize = 3;

/// Read hostnames from a server list CSV. The first row is a header.
pub fn parse_server_list(raw: &str) -> Result<Vec<String>> {
    let mut hosts = Vec::new();
    for (idx, line) in raw.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let host = line
            .split(',')
            .nth(HOSTNAME_COLUMN)
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "server list line {}: expected a hostname in column {}",
                    idx + 1,
                    HOSTNAME_COLUMN + 1
                ))
            })?;
        hosts.push(host.to_owned());
    }
    Ok(hosts)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleReport {
    pub toggled: Vec<String>,
    /// `(policy, error)` pairs.
    pub failed: Vec<(String, String)>,
}

pub struct TogglePolicies {
    factory: Arc<dyn ClientFactory>,
    hostnames: Vec<String>,
    enable: bool,
}

impl TogglePolicies {
    pub fn new(factory: Arc<dyn ClientFactory>, hostnames: Vec<String>, enable: bool) -> Self {
        Self {
            factory,
            hostnames,
            enable,
        }
    }

    /// CDP2 servers have no policies and are left out of the batch by the
    /// caller; they are not mapped here.
    pub fn dispatcher(self: Arc<Self>, workers: usize) -> VersionDispatcher<ToggleReport> {
        VersionDispatcher::new().workers(workers).on(
            &[ProtocolVersion::V3, ProtocolVersion::V4, ProtocolVersion::V5],
            move |s| {
                let op = self.clone();
                async move { op.handle_v3(&s).await }
            },
        )
    }

    pub async fn handle_v3(&self, server: &ServerDescriptor) -> Result<ToggleReport> {
        let client = self.factory.cdp(server)?;
        let service = client.policies().await?;
        let policies = service.get_policies().await?;
        let mut report = ToggleReport::default();

        for hostname in &self.hostnames {
            for policy in policies
                .iter()
                .filter(|p| &p.name == hostname && p.enabled != self.enable)
            {
                let result = if self.enable {
                    tracing::info!(policy = %policy.name, server = %server.hostname, "enabling policy");
                    service.enable_policy(policy).await
                } else {
                    tracing::info!(policy = %policy.name, server = %server.hostname, "disabling policy");
                    service.disable_policy(policy).await
                };
                match result {
                    Ok(()) => report.toggled.push(policy.name.clone()),
                    Err(e) => {
                        tracing::error!(policy = %policy.name, error = %e, "toggling policy failed");
                        report.failed.push((policy.name.clone(), e.to_string()));
                    }
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use cdp_client::testing::ScriptedFactory;
    use cdp_client::{Record, Value};

    use super::*;

    #[test]
    fn server_list_skips_header_and_reads_fourth_column() {
        let raw = "id,dc,rack,hostname\n1,ams,r1, web1 \n\n2,ams,r2,web2\n";
        assert_eq!(parse_server_list(raw).unwrap(), ["web1", "web2"]);
    }

    #[test]
    fn short_row_names_its_line() {
        let err = parse_server_list("id,dc,rack,hostname\n1,ams,r1\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[tokio::test]
    async fn only_mismatched_policies_are_toggled() {
        let factory = Arc::new(ScriptedFactory::new());
        let cdp = factory.server("cdp-a");
        cdp.on(
            "Policy2",
            "getPolicies",
            Value::List(vec![
                Record::new().with("id", "1").with("name", "web1").with("enabled", "true").into(),
                Record::new().with("id", "2").with("name", "web2").with("enabled", "false").into(),
                Record::new().with("id", "3").with("name", "web3").with("enabled", "true").into(),
            ]),
        )
        .on("Policy2", "disablePolicy", Value::Nil)
        .fail_next(
            "Policy2",
            "disablePolicy",
            Error::Fault {
                code: "soap:Server".into(),
                message: "policy is running".into(),
            },
        );
        let op = TogglePolicies::new(
            factory,
            vec!["web3".into(), "web1".into(), "web2".into()],
            false,
        );

        let server = ServerDescriptor::with_default_port(ProtocolVersion::V5, "cdp-a", true, "u", "p");
        let report = op.handle_v3(&server).await.unwrap();
        assert_eq!(report.failed[0].0, "web3");
        assert_eq!(report.toggled, ["web1"]);
        assert_eq!(cdp.calls_to("Policy2", "disablePolicy").len(), 2);
        assert!(cdp.calls_to("Policy2", "enablePolicy").is_empty());
    }
}
