//! Administrative operations across a fleet of CDP backup servers.
//!
//! Fleet-wide operations build a [`VersionDispatcher`] that routes each
//! server to the handler for its protocol generation. Host-oriented
//! commands (`copy_host`, `agents`) work on explicit clients instead.

pub mod agents;
pub mod copy_host;
pub mod db_plugin;
pub mod dispatch;
pub mod failed_backups;
pub mod locations;
pub mod passwords;
pub mod recovery_points;
pub mod toggle;

pub use agents::{banner, list_agents, AddAgent, AddedAgent};
pub use copy_host::{CopyHost, CopyOptions, CopyReport};
pub use db_plugin::{DbPluginReport, EnableDbPlugin, MysqlCredentials, DEFAULT_HOST_PATTERN};
pub use dispatch::{DispatchOutcome, VersionDispatcher, DEFAULT_WORKERS};
pub use failed_backups::{FailedBackups, FailedBackupsReport, FailingHost, FailureStatus};
pub use locations::{AgentLocation, Locations};
pub use passwords::ChangePassword;
pub use recovery_points::UpdateRecoveryPoints;
pub use toggle::{parse_server_list, TogglePolicies, ToggleReport};
