use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::plugin_system::state::PluginState;
use crate::plugin_system::version::{VersionConstraint, parse_lenient};

/// A declared dependency on another plugin.
#[derive(Debug, Clone)]
pub struct PluginDependency {
    pub plugin_id: String,
    pub constraint: VersionConstraint,
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.plugin_id, self.constraint)
    }
}

/// Why a dependency could not be satisfied.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("required plugin '{0}' is not registered")]
    MissingPlugin(String),
    #[error("required plugin '{0}' is not enabled")]
    DisabledPlugin(String),
    #[error("plugin '{plugin_id}' version {actual} does not satisfy constraint {constraint}")]
    IncompatibleVersion {
        plugin_id: String,
        constraint: VersionConstraint,
        actual: String,
    },
    #[error("plugin '{plugin_id}' has unparsable version '{version}'")]
    UnparsableVersion { plugin_id: String, version: String },
}

/// The slice of a registered plugin that dependency checking needs.
#[derive(Debug, Clone)]
pub struct DependencyView {
    pub state: PluginState,
    pub version: String,
}

/// Verify that every dependency is registered, enabled and version-compatible.
///
/// Checked at load time, immediately before requirement installation. The
/// discovery-time resolver is deliberately softer (it only orders and warns);
/// this is the hard gate.
pub fn ensure_satisfied(
    dependencies: &[PluginDependency],
    registered: &HashMap<String, DependencyView>,
) -> Result<(), DependencyError> {
    for dep in dependencies {
        let view = registered
            .get(&dep.plugin_id)
            .ok_or_else(|| DependencyError::MissingPlugin(dep.plugin_id.clone()))?;

        if !view.state.is_enabled() {
            return Err(DependencyError::DisabledPlugin(dep.plugin_id.clone()));
        }

        if let VersionConstraint::AtLeast(_) = dep.constraint {
            let actual = parse_lenient(&view.version).map_err(|_| {
                DependencyError::UnparsableVersion {
                    plugin_id: dep.plugin_id.clone(),
                    version: view.version.clone(),
                }
            })?;
            if !dep.constraint.matches(&actual) {
                return Err(DependencyError::IncompatibleVersion {
                    plugin_id: dep.plugin_id.clone(),
                    constraint: dep.constraint.clone(),
                    actual: view.version.clone(),
                });
            }
        }
    }
    Ok(())
}
