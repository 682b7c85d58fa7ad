use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cdp_domain::{ProtocolVersion, ServerDescriptor};

/// cdptool: administration across a fleet of R1Soft CDP backup servers.
#[derive(Debug, Parser)]
#[command(name = "cdptool", version, about)]
pub struct Cli {
    /// Tool settings file. Defaults apply when it does not exist.
    #[arg(long, global = true, env = "CDP_SETTINGS", default_value = "cdptool.toml")]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Report hosts whose last backup failed, per server.
    FailedBackups {
        /// Server list file.
        config: PathBuf,
    },
    /// Wiki table of which backup server protects which host.
    Locations {
        config: PathBuf,
    },
    /// Set a console user's password on every server.
    ChangePassword {
        /// `<username>:<new password>`.
        credentials: String,
        config: PathBuf,
    },
    /// Enable MySQL backups for agents matching a hostname pattern.
    EnableDbPlugin {
        config: PathBuf,
        /// `<mysql user>:<mysql password>` for the default instance.
        mysql: String,
        /// Regex matched at the start of hostnames and descriptions.
        #[arg(long)]
        pattern: Option<String>,
    },
    /// Enable or disable the policies of the hosts in a server list CSV.
    TogglePolicies {
        #[command(flatten)]
        mode: ToggleMode,
        config: PathBuf,
        /// CSV with a header row; the 4th column is the hostname.
        server_list: PathBuf,
    },
    /// Move every host's backup configuration to another server.
    CopyHost {
        source: String,
        destination: String,
        /// Also copy hosts whose policy is disabled.
        #[arg(long)]
        include_disabled: bool,
        #[arg(long)]
        include_db_plugin: bool,
        #[arg(long)]
        include_cp_plugin: bool,
        #[command(flatten)]
        login: Login,
    },
    /// Print every agent hostname on the given servers.
    ListAgents {
        #[arg(required = true)]
        hosts: Vec<String>,
        /// Print a `<decoration><server><noitaroced>` banner before each server.
        #[arg(short, long)]
        decoration: Option<String>,
        #[command(flatten)]
        login: Login,
    },
    /// Provision agents with a disk safe and a daily policy.
    AddAgent {
        server: String,
        #[arg(required = true)]
        hostnames: Vec<String>,
        /// Description prefix; the hostname is appended in parentheses.
        #[arg(short, long)]
        description: Option<String>,
        /// Enable the database add-on with `<mysql user>:<mysql password>`.
        #[arg(long)]
        db_addon: Option<String>,
        #[arg(short = 'R', long, default_value_t = cdp_ops::agents::DEFAULT_RECOVERY_POINTS)]
        recovery_point_limit: i64,
        #[command(flatten)]
        login: Login,
    },
    /// Set every policy's recovery-point limit.
    RecoveryPoints {
        config: PathBuf,
        #[arg(long, default_value_t = cdp_ops::agents::DEFAULT_RECOVERY_POINTS)]
        limit: i64,
    },
}

#[derive(Debug, Clone, Copy, Args)]
#[group(required = true, multiple = false)]
pub struct ToggleMode {
    #[arg(long)]
    pub enable: bool,
    #[arg(long)]
    pub disable: bool,
}

/// API login for commands that address servers by hostname.
#[derive(Debug, Clone, Args)]
pub struct Login {
    #[arg(short, long, env = "R1SOFT_USERNAME", default_value = "admin")]
    pub username: String,
    #[arg(short, long, env = "R1SOFT_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
    /// Talk plain HTTP instead of HTTPS.
    #[arg(long)]
    pub no_tls: bool,
}

impl Login {
    pub fn server(&self, hostname: &str) -> ServerDescriptor {
        ServerDescriptor::with_default_port(
            ProtocolVersion::V3,
            hostname,
            !self.no_tls,
            self.username.as_str(),
            self.password.as_str(),
        )
    }
}
