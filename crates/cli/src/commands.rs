//! Subcommand execution. Reports go to `out`; logs go through `tracing`.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use futures_util::StreamExt;

use cdp_client::ClientFactory;
use cdp_domain::server::load_servers;
use cdp_domain::ServerDescriptor;
use cdp_ops::{
    banner, list_agents, parse_server_list, AddAgent, ChangePassword, CopyHost, CopyOptions,
    EnableDbPlugin, FailedBackups, Locations, MysqlCredentials, TogglePolicies,
    UpdateRecoveryPoints, VersionDispatcher, DEFAULT_HOST_PATTERN,
};

use crate::cli::Command;
use crate::report;

/// What every subcommand needs besides its own arguments.
pub struct Context {
    pub factory: Arc<dyn ClientFactory>,
    pub workers: usize,
}

fn servers_from(path: &Path) -> anyhow::Result<Vec<ServerDescriptor>> {
    load_servers(path).with_context(|| format!("loading server list {}", path.display()))
}

/// Print one summary line per server as handlers complete.
async fn stream_summaries<T: Send + 'static>(
    dispatcher: VersionDispatcher<T>,
    servers: Vec<ServerDescriptor>,
    out: &mut dyn Write,
    render: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    tracing::info!(run_id = dispatcher.run_id(), servers = servers.len(), "dispatching");
    let mut outcomes = std::pin::pin!(dispatcher.dispatch(servers));
    while let Some(outcome) = outcomes.next().await {
        writeln!(out, "{}", report::summary_line(&outcome, &render))?;
    }
    Ok(())
}

pub async fn run(command: Command, ctx: &Context, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        Command::FailedBackups { config } => {
            let servers = servers_from(&config)?;
            let dispatcher = Arc::new(FailedBackups::new(ctx.factory.clone())).dispatcher(ctx.workers);
            tracing::info!(run_id = dispatcher.run_id(), "checking failed backups");
            let outcomes = dispatcher.dispatch_ordered(servers).await;
            out.write_all(report::failed_backups(&outcomes).as_bytes())?;
        }

        Command::Locations { config } => {
            let servers = servers_from(&config)?;
            let dispatcher = Arc::new(Locations::new(ctx.factory.clone())).dispatcher(ctx.workers);
            tracing::info!(run_id = dispatcher.run_id(), "collecting agent locations");
            let outcomes = dispatcher.dispatch_ordered(servers).await;
            out.write_all(report::locations(&outcomes).as_bytes())?;
        }

        Command::ChangePassword { credentials, config } => {
            let (username, password) = ChangePassword::parse_credentials(&credentials)?;
            let servers = servers_from(&config)?;
            let op = Arc::new(ChangePassword::new(ctx.factory.clone(), &username, &password));
            stream_summaries(op.dispatcher(ctx.workers), servers, out, bool::to_string).await?;
        }

        Command::EnableDbPlugin {
            config,
            mysql,
            pattern,
        } => {
            let mysql = MysqlCredentials::parse(&mysql)?;
            let pattern = pattern.as_deref().unwrap_or(DEFAULT_HOST_PATTERN);
            let servers = servers_from(&config)?;
            let op = Arc::new(EnableDbPlugin::new(ctx.factory.clone(), pattern, mysql)?);
            let outcomes = op.dispatcher(ctx.workers).dispatch_ordered(servers).await;
            for outcome in &outcomes {
                let line = report::summary_line(outcome, |r| {
                    format!(
                        "agents enabled: {}; policies updated: {}",
                        report::name_list(&r.agents_enabled),
                        report::name_list(&r.policies_updated),
                    )
                });
                writeln!(out, "{line}")?;
                if let Ok(r) = &outcome.result {
                    for (host, err) in &r.failures {
                        writeln!(out, "  {host}: {err}")?;
                    }
                }
            }
        }

        Command::TogglePolicies {
            mode,
            config,
            server_list,
        } => {
            let raw = std::fs::read_to_string(&server_list)
                .with_context(|| format!("reading {}", server_list.display()))?;
            let hostnames = parse_server_list(&raw)?;
            let (servers, legacy): (Vec<_>, Vec<_>) = servers_from(&config)?
                .into_iter()
                .partition(|s| s.protocol_version.is_soap());
            for server in &legacy {
                tracing::info!(server = %server.hostname, "no policies on CDP2, skipping");
            }
            let op = Arc::new(TogglePolicies::new(ctx.factory.clone(), hostnames, mode.enable));
            let outcomes = op.dispatcher(ctx.workers).dispatch_ordered(servers).await;
            for outcome in &outcomes {
                let line = report::summary_line(outcome, |r| {
                    format!("toggled: {}", report::name_list(&r.toggled))
                });
                writeln!(out, "{line}")?;
                if let Ok(r) = &outcome.result {
                    for (policy, err) in &r.failed {
                        writeln!(out, "  {policy}: {err}")?;
                    }
                }
            }
        }

        Command::CopyHost {
            source,
            destination,
            include_disabled,
            include_db_plugin,
            include_cp_plugin,
            login,
        } => {
            let src = ctx.factory.cdp(&login.server(&source))?;
            let dest = ctx.factory.cdp(&login.server(&destination))?;
            let op = CopyHost::new(CopyOptions {
                include_disabled,
                include_db_plugin,
                include_cp_plugin,
            });
            let copied = op
                .run(&src, &dest)
                .await
                .with_context(|| format!("copying hosts from {source} to {destination}"))?;
            for host in &copied.copied {
                writeln!(
                    out,
                    "copied {}: agent {}, disk safe {}, policy {}",
                    host.hostname, host.agent_id, host.disk_safe_id, host.policy_id
                )?;
            }
            for host in &copied.skipped {
                writeln!(out, "skipped {host}: already on {destination}")?;
            }
        }

        Command::ListAgents {
            hosts,
            decoration,
            login,
        } => {
            for host in &hosts {
                let client = ctx.factory.cdp(&login.server(host))?;
                let agents = list_agents(&client)
                    .await
                    .with_context(|| format!("listing agents on {host}"))?;
                if let Some(decoration) = &decoration {
                    writeln!(out, "{}", banner(decoration, host))?;
                }
                for agent in agents {
                    writeln!(out, "{agent}")?;
                }
            }
        }

        Command::AddAgent {
            server,
            hostnames,
            description,
            db_addon,
            recovery_point_limit,
            login,
        } => {
            let client = ctx.factory.cdp(&login.server(&server))?;
            let op = AddAgent {
                description,
                db_addon: db_addon.as_deref().map(MysqlCredentials::parse).transpose()?,
                recovery_point_limit,
            };
            for hostname in &hostnames {
                let added = op
                    .add(&client, hostname)
                    .await
                    .with_context(|| format!("adding {hostname} to {server}"))?;
                writeln!(
                    out,
                    "{}: agent {}, disk safe {}, policy {}",
                    added.hostname, added.agent_id, added.disk_safe_id, added.policy_id
                )?;
            }
        }

        Command::RecoveryPoints { config, limit } => {
            let servers = servers_from(&config)?;
            let op = Arc::new(UpdateRecoveryPoints::new(ctx.factory.clone(), limit));
            stream_summaries(op.dispatcher(ctx.workers), servers, out, |names| {
                format!("updated {}", report::name_list(names))
            })
            .await?;
        }
    }
    Ok(())
}
