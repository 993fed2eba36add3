//! # NetVane Core UI Bridge
//!
//! Abstraction layer between the plugin system and whatever shell is
//! presenting it. Plugins contribute toolbar actions, menu entries, dock
//! widgets and device-table columns through their descriptor hooks; the
//! bridge fans removal requests out to every registered connector when a
//! plugin is torn down, so no contributed component outlives its plugin.

use std::fmt;

use thiserror::Error;

/// Errors reported by UI connectors.
#[derive(Debug, Error)]
pub enum UiBridgeError {
    #[error("connector '{connector}' failed to remove components for '{plugin_id}': {message}")]
    RemovalFailed {
        connector: String,
        plugin_id: String,
        message: String,
    },
}

/// Where a dock widget should be placed in the host window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockArea {
    Left,
    Right,
    Bottom,
}

/// A toolbar button contributed by a plugin.
#[derive(Debug, Clone)]
pub struct ToolbarAction {
    pub id: String,
    pub label: String,
    pub tooltip: Option<String>,
}

/// A menu entry contributed by a plugin.
#[derive(Debug, Clone)]
pub struct MenuAction {
    pub id: String,
    pub menu: String,
    pub label: String,
}

/// A dockable panel contributed by a plugin.
#[derive(Debug, Clone)]
pub struct DockWidget {
    pub id: String,
    pub title: String,
    pub area: DockArea,
}

/// An extra column for the device table.
#[derive(Debug, Clone)]
pub struct DeviceTableColumn {
    pub id: String,
    pub header: String,
}

/// A configurable setting exposed on the plugin's settings page.
#[derive(Debug, Clone)]
pub struct PluginSetting {
    pub key: String,
    pub label: String,
    pub value: String,
}

/// A UI implementation able to host plugin-contributed components.
///
/// Connectors only need to implement removal for the component kinds they
/// actually host; the defaults are no-ops.
pub trait UiConnector: Send + Sync {
    /// Unique name of this connector, used in log messages.
    fn name(&self) -> &str;

    fn remove_toolbar_actions(&mut self, _plugin_id: &str) -> Result<(), UiBridgeError> {
        Ok(())
    }

    fn remove_menu_actions(&mut self, _plugin_id: &str) -> Result<(), UiBridgeError> {
        Ok(())
    }

    fn remove_dock_widgets(&mut self, _plugin_id: &str) -> Result<(), UiBridgeError> {
        Ok(())
    }

    fn remove_table_columns(&mut self, _plugin_id: &str) -> Result<(), UiBridgeError> {
        Ok(())
    }
}

/// Fans component removal out to every registered connector.
pub struct UiBridgeManager {
    connectors: Vec<Box<dyn UiConnector>>,
}

impl fmt::Debug for UiBridgeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiBridgeManager")
            .field("connectors", &self.connectors.len())
            .finish()
    }
}

impl UiBridgeManager {
    pub fn new() -> Self {
        Self {
            connectors: Vec::new(),
        }
    }

    /// Register a UI connector. Components removed on plugin teardown are
    /// removed from every registered connector.
    pub fn register_connector(&mut self, connector: Box<dyn UiConnector>) {
        log::debug!("Registered UI connector '{}'", connector.name());
        self.connectors.push(connector);
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.len()
    }

    /// Remove every component the given plugin contributed, across all
    /// connectors. Failures are logged and do not stop the sweep; teardown
    /// must always run to completion.
    pub fn deregister_plugin_components(&mut self, plugin_id: &str) {
        for connector in &mut self.connectors {
            let name = connector.name().to_string();
            for result in [
                connector.remove_toolbar_actions(plugin_id),
                connector.remove_menu_actions(plugin_id),
                connector.remove_dock_widgets(plugin_id),
                connector.remove_table_columns(plugin_id),
            ] {
                if let Err(e) = result {
                    log::warn!("UI cleanup for plugin '{plugin_id}' on connector '{name}': {e}");
                }
            }
        }
    }
}

impl Default for UiBridgeManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
