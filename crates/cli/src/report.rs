//! DokuWiki tables and plain-text summaries printed on stdout.

use std::fmt::Write as _;

use cdp_domain::error::Error;
use cdp_domain::ServerDescriptor;
use cdp_ops::{AgentLocation, DispatchOutcome, FailedBackupsReport};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const HOST_LIST_HEADER: &str =
    "^ Hostname ^ Description ^ Backup Server ^ Host Type ^ Enabled ^ MySQL Module ^";
pub const SERVER_LIST_HEADER: &str = "^ Backup Server ^ Polling Status ^";

/// `host (CDPn)`, the label every per-server heading uses.
pub fn server_label(server: &ServerDescriptor) -> String {
    format!("{} ({})", server.hostname, server.protocol_version)
}

/// Heading and detail row for a server whose handler failed.
pub fn error_rows(server: &ServerDescriptor, err: &Error) -> String {
    format!(
        "^ {} ^ ERROR! ^\n| {} | {} |\n",
        server_label(server),
        err.kind(),
        err
    )
}

/// One heading per server with its latest success, then a row per failing
/// host.
pub fn failed_backups(outcomes: &[DispatchOutcome<FailedBackupsReport>]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        match &outcome.result {
            Err(e) => out.push_str(&error_rows(&outcome.server, e)),
            Ok(report) => {
                let last = report
                    .last_successful
                    .map(|t| t.format(TIME_FORMAT).to_string())
                    .unwrap_or_else(|| "never".into());
                let _ = writeln!(out, "^ {} ^ {} ^", server_label(&outcome.server), last);
                for host in &report.failing {
                    let _ = writeln!(out, "| {} | {} |", host.hostname, host.status);
                }
            }
        }
    }
    out
}

fn location_row(server: &ServerDescriptor, agent: &AgentLocation) -> String {
    format!(
        "| {} | {} | [[{}|{}]] | {} | {} | {} |",
        agent.hostname,
        agent.description,
        server.web_link(),
        server.hostname,
        agent.host_type,
        agent.active,
        agent.mysql_module,
    )
}

/// The host table sorted by row, then the polling status of every server
/// in input order.
pub fn locations(outcomes: &[DispatchOutcome<Vec<AgentLocation>>]) -> String {
    let mut rows: Vec<String> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok().map(|agents| (&o.server, agents)))
        .flat_map(|(server, agents)| agents.iter().map(move |a| location_row(server, a)))
        .collect();
    rows.sort();

    let mut out = String::new();
    let _ = writeln!(out, "{HOST_LIST_HEADER}");
    for row in rows {
        let _ = writeln!(out, "{row}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{SERVER_LIST_HEADER}");
    for outcome in outcomes {
        let _ = writeln!(out, "| {} | {} |", outcome.server.hostname, outcome.is_ok());
    }
    let _ = writeln!(out);
    out
}

/// `host: <value>` on success, `host: ERROR <kind>: <message>` otherwise.
pub fn summary_line<T>(outcome: &DispatchOutcome<T>, render: impl Fn(&T) -> String) -> String {
    match &outcome.result {
        Ok(v) => format!("{}: {}", outcome.server.hostname, render(v)),
        Err(e) => format!("{}: ERROR {}: {}", outcome.server.hostname, e.kind(), e),
    }
}

/// Comma-separated names, or `-` for none.
pub fn name_list(names: &[String]) -> String {
    if names.is_empty() {
        "-".into()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use cdp_domain::ProtocolVersion;
    use cdp_ops::{FailingHost, FailureStatus};

    use super::*;

    fn server(v: ProtocolVersion, host: &str) -> ServerDescriptor {
        ServerDescriptor::with_default_port(v, host, true, "admin", "pw")
    }

    #[test]
    fn failed_backups_table() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 4, 5, 6).unwrap();
        let outcomes = vec![
            DispatchOutcome {
                server: server(ProtocolVersion::V3, "cdp-a"),
                result: Ok(FailedBackupsReport {
                    last_successful: Some(t),
                    failing: vec![FailingHost {
                        hostname: "web1".into(),
                        status: FailureStatus::NoFinishedRun,
                    }],
                }),
            },
            DispatchOutcome {
                server: server(ProtocolVersion::V2, "cdp-b"),
                result: Err(Error::Timeout("30s elapsed".into())),
            },
        ];
        assert_eq!(
            failed_backups(&outcomes),
            "^ cdp-a (CDP3) ^ 2024-03-01 04:05:06 ^\n\
             | web1 | never |\n\
             ^ cdp-b (CDP2) ^ ERROR! ^\n\
             | Timeout | timeout: 30s elapsed |\n"
        );
    }

    #[test]
    fn locations_rows_are_sorted_and_failures_polled() {
        let agent = |host: &str| AgentLocation {
            hostname: host.into(),
            description: String::new(),
            host_type: "LINUX".into(),
            active: true,
            mysql_module: false,
        };
        let outcomes = vec![
            DispatchOutcome {
                server: server(ProtocolVersion::V5, "cdp-a"),
                result: Ok(vec![agent("web2"), agent("web1")]),
            },
            DispatchOutcome {
                server: server(ProtocolVersion::V2, "cdp-b"),
                result: Err(Error::Transport("refused".into())),
            },
        ];
        let text = locations(&outcomes);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HOST_LIST_HEADER);
        assert_eq!(
            lines[1],
            "| web1 |  | [[https://cdp-a:8001/|cdp-a]] | LINUX | true | false |"
        );
        assert!(lines[2].starts_with("| web2 "));
        assert_eq!(lines[4], SERVER_LIST_HEADER);
        assert_eq!(lines[5], "| cdp-a | true |");
        assert_eq!(lines[6], "| cdp-b | false |");
    }

    #[test]
    fn summary_names_error_kind() {
        let outcome: DispatchOutcome<bool> = DispatchOutcome {
            server: server(ProtocolVersion::V4, "cdp-c"),
            result: Err(Error::Auth("HTTP 401".into())),
        };
        assert_eq!(
            summary_line(&outcome, bool::to_string),
            "cdp-c: ERROR AuthError: auth: HTTP 401"
        );
    }
}
