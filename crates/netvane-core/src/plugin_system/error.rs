use std::path::PathBuf;

use thiserror::Error;

use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::state::PluginState;
use crate::plugin_system::version::VersionError;

/// Errors raised by the plugin system.
#[derive(Debug, Error)]
pub enum PluginSystemError {
    #[error("malformed manifest at {path}: {message}")]
    MalformedManifest { path: PathBuf, message: String },

    #[error("failed to read manifest at {path}")]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin '{plugin_id}' v{version} is not compatible with host v{host_version}")]
    IncompatibleVersion {
        plugin_id: String,
        version: String,
        host_version: String,
    },

    #[error("plugin '{plugin_id}' has unsatisfied dependencies")]
    DependencyUnsatisfied {
        plugin_id: String,
        #[source]
        source: DependencyError,
    },

    #[error("failed to install requirement '{package}' for plugin '{plugin_id}': {message}")]
    RequirementInstallFailed {
        plugin_id: String,
        package: String,
        message: String,
    },

    #[error(
        "installing requirement '{package}' for plugin '{plugin_id}' exceeded {timeout_secs}s"
    )]
    RequirementInstallTimeout {
        plugin_id: String,
        package: String,
        timeout_secs: u64,
    },

    #[error("plugin '{plugin_id}' entry point '{entry_point}' could not be resolved: {message}")]
    EntryPointMissing {
        plugin_id: String,
        entry_point: String,
        message: String,
    },

    #[error("plugin '{plugin_id}' failed to initialize: {message}")]
    InitializeFailed { plugin_id: String, message: String },

    #[error("plugin '{plugin_id}' declined initialization")]
    InitializeRejected { plugin_id: String },

    #[error("loading plugin '{plugin_id}' exceeded {timeout_secs}s")]
    LoadTimeout { plugin_id: String, timeout_secs: u64 },

    #[error("plugin '{plugin_id}': transition from {from} to {to} is not allowed")]
    InvalidTransition {
        plugin_id: String,
        from: PluginState,
        to: PluginState,
    },

    #[error("plugin '{0}' is not registered")]
    PluginNotFound(String),

    #[error("plugin '{plugin_id}' must be enabled before loading")]
    NotEnabled { plugin_id: String },

    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("registry {operation} failed for {path}")]
    RegistryIo {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry serialization error: {0}")]
    RegistrySerialization(#[from] serde_json::Error),

    #[error("configuration error in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, PluginSystemError>;
