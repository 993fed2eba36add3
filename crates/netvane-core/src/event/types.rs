use std::any::Any;

use crate::event::Event;
use crate::plugin_system::state::PluginState;

/// Lifecycle notifications emitted by the plugin system.
#[derive(Debug, Clone)]
pub enum PluginLifecycleEvent {
    /// A new plugin has been discovered on disk
    Discovered { plugin_id: String },
    /// Plugin has been enabled
    Enabled { plugin_id: String },
    /// Plugin has been disabled
    Disabled { plugin_id: String },
    /// Plugin instance has been created and initialized
    Loaded { plugin_id: String },
    /// Plugin instance has been torn down
    Unloaded { plugin_id: String },
    /// Generic state change, emitted for every transition
    StateChanged {
        plugin_id: String,
        from: PluginState,
        to: PluginState,
    },
}

impl PluginLifecycleEvent {
    /// Identifier of the plugin this notification concerns.
    pub fn plugin_id(&self) -> &str {
        match self {
            PluginLifecycleEvent::Discovered { plugin_id }
            | PluginLifecycleEvent::Enabled { plugin_id }
            | PluginLifecycleEvent::Disabled { plugin_id }
            | PluginLifecycleEvent::Loaded { plugin_id }
            | PluginLifecycleEvent::Unloaded { plugin_id }
            | PluginLifecycleEvent::StateChanged { plugin_id, .. } => plugin_id,
        }
    }
}

impl Event for PluginLifecycleEvent {
    fn name(&self) -> &'static str {
        match self {
            PluginLifecycleEvent::Discovered { .. } => "plugin.discovered",
            PluginLifecycleEvent::Enabled { .. } => "plugin.enabled",
            PluginLifecycleEvent::Disabled { .. } => "plugin.disabled",
            PluginLifecycleEvent::Loaded { .. } => "plugin.loaded",
            PluginLifecycleEvent::Unloaded { .. } => "plugin.unloaded",
            PluginLifecycleEvent::StateChanged { .. } => "plugin.state_changed",
        }
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
