use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a plugin.
///
/// `Loaded` implies enabled: a loaded plugin is an enabled plugin with a
/// live instance. There is no "loaded but disabled" state; disabling a
/// loaded plugin tears the instance down as part of the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    /// Found on disk, never enabled by anyone.
    Discovered,
    /// Eligible for loading, no live instance.
    Enabled,
    /// Instance created and initialized successfully.
    Loaded,
    /// Excluded from loading by explicit choice.
    Disabled,
    /// A lifecycle operation failed; diagnostic retained on the handle.
    Error,
}

impl PluginState {
    /// Whether the plugin counts as enabled. Loaded plugins are enabled
    /// plugins with an instance, so both states qualify.
    pub fn is_enabled(self) -> bool {
        matches!(self, PluginState::Enabled | PluginState::Loaded)
    }

    /// Whether a transition from `self` to `target` is legal.
    ///
    /// Any state may move to `Error`, and a transition to the current state
    /// is always accepted as a no-op. Everything else follows the lifecycle:
    /// discovered plugins get enabled or disabled, enabled plugins get
    /// loaded or disabled, loaded plugins unload back to enabled or get
    /// disabled, disabled plugins get re-enabled. `Error` is terminal until
    /// the plugin is rediscovered.
    pub fn can_transition_to(self, target: PluginState) -> bool {
        if self == target || target == PluginState::Error {
            return true;
        }
        matches!(
            (self, target),
            (PluginState::Discovered, PluginState::Enabled)
                | (PluginState::Discovered, PluginState::Disabled)
                | (PluginState::Enabled, PluginState::Loaded)
                | (PluginState::Enabled, PluginState::Disabled)
                | (PluginState::Loaded, PluginState::Enabled)
                | (PluginState::Loaded, PluginState::Disabled)
                | (PluginState::Disabled, PluginState::Enabled)
        )
    }

    /// Whether moving from `self` to `target` must drop the live instance.
    /// Leaving `Loaded`, or entering `Disabled` or `Error`, always releases.
    pub fn releases_instance(self, target: PluginState) -> bool {
        (self == PluginState::Loaded && target != PluginState::Loaded)
            || matches!(target, PluginState::Disabled | PluginState::Error)
    }

    /// Map the legacy persisted `{enabled, loaded}` flag pair onto a state.
    /// Older registry files stored two booleans instead of a state name.
    pub fn from_enabled_loaded(enabled: bool, loaded: bool) -> Self {
        match (enabled, loaded) {
            (true, true) => PluginState::Loaded,
            (true, false) => PluginState::Enabled,
            (false, _) => PluginState::Disabled,
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginState::Discovered => "discovered",
            PluginState::Enabled => "enabled",
            PluginState::Loaded => "loaded",
            PluginState::Disabled => "disabled",
            PluginState::Error => "error",
        };
        write!(f, "{name}")
    }
}
