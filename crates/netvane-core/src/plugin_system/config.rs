use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::plugin_system::error::{PluginSystemError, Result};

/// Tunable settings of the plugin system, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSystemConfig {
    /// Directory scanned for user-installed plugins.
    pub user_plugin_dir: PathBuf,
    /// Optional per-workspace plugin directory, scanned last.
    pub workspace_plugin_dir: Option<PathBuf>,
    /// Auto-enable plugins seen for the first time. Bundled plugins are
    /// always auto-enabled regardless of this flag.
    pub auto_enable_new: bool,
    /// Hard ceiling on a single plugin initialization.
    pub load_timeout_secs: u64,
    /// Hard ceiling on a single requirement install.
    pub install_timeout_secs: u64,
    /// How often background installs are polled for completion.
    pub poll_interval_ms: u64,
    /// Where plugin states are persisted.
    pub registry_file: PathBuf,
    /// Root handed to plugins for their own storage.
    pub data_dir: PathBuf,
}

impl Default for PluginSystemConfig {
    fn default() -> Self {
        Self {
            user_plugin_dir: PathBuf::from("plugins"),
            workspace_plugin_dir: None,
            auto_enable_new: false,
            load_timeout_secs: 30,
            install_timeout_secs: 120,
            poll_interval_ms: 200,
            registry_file: PathBuf::from("plugin_registry.json"),
            data_dir: PathBuf::from("."),
        }
    }
}

impl PluginSystemConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Read configuration from a TOML file.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| PluginSystemError::Config {
                path: path.to_path_buf(),
                message: format!("failed to read: {e}"),
            })?;
        toml::from_str(&contents).map_err(|e| PluginSystemError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
