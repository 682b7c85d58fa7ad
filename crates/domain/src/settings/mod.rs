mod client;
mod dispatch;
mod logging;

pub use client::*;
pub use dispatch::*;
pub use logging::*;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tool-wide settings loaded from `cdptool.toml`.
///
/// Every section and field has a default, so an absent file is the same as
/// an empty one.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Parse settings from TOML text and validate them.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(raw).map_err(|e| Error::Config(format!("settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Settings::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.client.max_attempts == 0 {
            return Err(Error::Config("client.max_attempts must be at least 1".into()));
        }
        if self.dispatch.workers == 0 {
            return Err(Error::Config("dispatch.workers must be at least 1".into()));
        }
        Ok(())
    }
}
