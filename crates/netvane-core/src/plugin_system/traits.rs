use std::path::PathBuf;

use semver::Version;

use crate::event::EventHandler;
use crate::plugin_system::manifest::PluginDescriptor;
use crate::ui_bridge::{
    DeviceTableColumn, DockWidget, MenuAction, PluginSetting, ToolbarAction,
};

/// The contract every plugin implements.
///
/// `initialize` runs once, right after instantiation, on a blocking worker
/// thread. Returning `false` declines initialization and aborts the load
/// without an error state change on the host side beyond the reported
/// failure. `cleanup` runs during unload and must not assume any host
/// service is still reachable.
pub trait NetworkPlugin: Send {
    /// Wire the plugin up to the host. Subscriptions registered on the
    /// context are tracked and removed automatically at unload.
    fn initialize(&mut self, context: &mut HostContext, descriptor: &PluginDescriptor) -> bool;

    /// Release everything the plugin holds. Called exactly once per
    /// successful initialization, before the instance is dropped.
    fn cleanup(&mut self);

    /// Toolbar buttons this plugin contributes.
    fn toolbar_actions(&self) -> Vec<ToolbarAction> {
        Vec::new()
    }

    /// Menu entries this plugin contributes.
    fn menu_actions(&self) -> Vec<MenuAction> {
        Vec::new()
    }

    /// Dockable panels this plugin contributes.
    fn dock_widgets(&self) -> Vec<DockWidget> {
        Vec::new()
    }

    /// Extra device-table columns this plugin contributes.
    fn device_table_columns(&self) -> Vec<DeviceTableColumn> {
        Vec::new()
    }

    /// Settings shown on the plugin's configuration page.
    fn settings(&self) -> Vec<PluginSetting> {
        Vec::new()
    }

    /// Apply a changed setting value.
    fn update_setting(&mut self, _key: &str, _value: &str) {}
}

/// Host services handed to a plugin during initialization.
///
/// Event subscriptions go through here so the lifecycle controller can
/// record their ids and unsubscribe them at unload.
pub struct HostContext {
    pub app_version: Version,
    pub data_dir: PathBuf,
    subscriptions: Vec<(String, Box<dyn EventHandler>)>,
}

impl HostContext {
    pub fn new(app_version: Version, data_dir: PathBuf) -> Self {
        Self {
            app_version,
            data_dir,
            subscriptions: Vec::new(),
        }
    }

    /// Subscribe to a host event. The registration is committed after
    /// initialization succeeds and removed automatically at unload.
    pub fn subscribe(&mut self, event_name: &str, handler: Box<dyn EventHandler>) {
        self.subscriptions.push((event_name.to_string(), handler));
    }

    pub(crate) fn take_subscriptions(&mut self) -> Vec<(String, Box<dyn EventHandler>)> {
        std::mem::take(&mut self.subscriptions)
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("app_version", &self.app_version)
            .field("data_dir", &self.data_dir)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
