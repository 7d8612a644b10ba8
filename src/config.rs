use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::deserialize_duration;

fn default_tool() -> String {
    "op".to_string()
}

/// Default time to wait for stdin before giving up (30 seconds).
fn default_stdin_deadline() -> Duration {
    Duration::from_secs(30)
}

/// Helper configuration, read from `~/.config/credkeep/config.toml` when
/// present. Command-line flags override these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Binary name (or path) of the external secret-manager CLI.
    pub tool: String,

    /// How long stdin may block before the invocation fails with a timeout.
    #[serde(
        default = "default_stdin_deadline",
        deserialize_with = "deserialize_duration"
    )]
    pub stdin_deadline: Duration,

    /// Overrides the built-in default vault name. The name stored in the
    /// keystore (set via the `vault` command) still takes precedence.
    pub vault: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            stdin_deadline: default_stdin_deadline(),
            vault: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        Some(
            dirs::config_dir()?
                .join(crate::mode::SERVICE_NAME)
                .join("config.toml"),
        )
    }

    /// Load the config file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {path:?}"))
    }
}
