use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;

use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::version::VersionConstraint;

/// Which plugin directory a plugin was discovered in.
///
/// Directories are scanned bundled first, then user, then workspace; the
/// first directory to register an id wins and later occurrences are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOrigin {
    Bundled,
    User,
    Workspace,
}

impl DiscoveryOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscoveryOrigin::Bundled => "bundled",
            DiscoveryOrigin::User => "user",
            DiscoveryOrigin::Workspace => "workspace",
        }
    }
}

/// External packages a plugin needs before its code can run.
#[derive(Debug, Clone, Default)]
pub struct PluginRequirements {
    /// Installed through the host's package provider when absent.
    pub platform_packages: Vec<String>,
    /// Only checked for presence; never installed or removed by the host.
    pub system_packages: Vec<String>,
}

impl PluginRequirements {
    pub fn is_empty(&self) -> bool {
        self.platform_packages.is_empty() && self.system_packages.is_empty()
    }
}

/// Everything known about a plugin from its manifest and install location.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub author: Option<String>,
    /// Factory name for builtins, or a relative library path for dynamic
    /// plugins (recognized by its `.so`/`.dll`/`.dylib` suffix).
    pub entry_point: String,
    /// Directory containing the manifest.
    pub install_path: PathBuf,
    pub min_app_version: Option<String>,
    pub max_app_version: Option<String>,
    pub dependencies: Vec<PluginDependency>,
    pub requirements: PluginRequirements,
    pub changelog: Option<String>,
    /// Set when none of API.md, README.md or a docs directory exist next
    /// to the manifest. Informational only; never blocks loading.
    pub docs_missing: bool,
    pub origin: DiscoveryOrigin,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    id: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRequirements {
    #[serde(default)]
    platform_packages: Vec<String>,
    #[serde(default)]
    system_packages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    id: Option<String>,
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    author: Option<String>,
    entry_point: Option<String>,
    #[serde(default)]
    min_app_version: Option<String>,
    #[serde(default)]
    max_app_version: Option<String>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    requirements: RawRequirements,
    #[serde(default)]
    changelog: Option<String>,
}

fn required<T>(field: Option<T>, name: &str, path: &Path) -> Result<T> {
    field.ok_or_else(|| PluginSystemError::MalformedManifest {
        path: path.to_path_buf(),
        message: format!("missing required field '{name}'"),
    })
}

/// Read and validate a `manifest.json`, producing a [`PluginDescriptor`].
///
/// Required fields are id, name, version and entry_point. Dependency
/// constraints that fail to parse are downgraded to "any version" with a
/// warning; a typo in one constraint should not hide the whole plugin.
pub async fn load_descriptor(
    manifest_path: &Path,
    origin: DiscoveryOrigin,
) -> Result<PluginDescriptor> {
    let contents =
        fs::read_to_string(manifest_path)
            .await
            .map_err(|e| PluginSystemError::ManifestIo {
                path: manifest_path.to_path_buf(),
                source: e,
            })?;

    let raw: RawManifest =
        serde_json::from_str(&contents).map_err(|e| PluginSystemError::MalformedManifest {
            path: manifest_path.to_path_buf(),
            message: e.to_string(),
        })?;

    let id = required(raw.id, "id", manifest_path)?;
    let name = required(raw.name, "name", manifest_path)?;
    let version = required(raw.version, "version", manifest_path)?;
    let entry_point = required(raw.entry_point, "entry_point", manifest_path)?;

    let mut dependencies = Vec::with_capacity(raw.dependencies.len());
    for dep in raw.dependencies {
        let constraint = match dep.version.as_deref() {
            None => VersionConstraint::Any,
            Some(raw_constraint) => match VersionConstraint::parse(raw_constraint) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!(
                        "Plugin '{id}': ignoring bad version constraint for dependency '{}': {e}",
                        dep.id
                    );
                    VersionConstraint::Any
                }
            },
        };
        dependencies.push(PluginDependency {
            plugin_id: dep.id,
            constraint,
        });
    }

    let install_path = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let docs_missing = !has_documentation(&install_path).await;
    if docs_missing {
        log::warn!("Plugin '{id}' ships no documentation (API.md, README.md or docs/)");
    }

    Ok(PluginDescriptor {
        id,
        name,
        version,
        description: raw.description,
        author: raw.author,
        entry_point,
        install_path,
        min_app_version: raw.min_app_version,
        max_app_version: raw.max_app_version,
        dependencies,
        requirements: PluginRequirements {
            platform_packages: raw.requirements.platform_packages,
            system_packages: raw.requirements.system_packages,
        },
        changelog: raw.changelog,
        docs_missing,
        origin,
    })
}

async fn has_documentation(install_path: &Path) -> bool {
    for candidate in ["API.md", "README.md", "docs"] {
        if fs::try_exists(install_path.join(candidate))
            .await
            .unwrap_or(false)
        {
            return true;
        }
    }
    false
}
