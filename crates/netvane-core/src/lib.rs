// Core library for the NetVane plugin engine.
pub mod event;
pub mod plugin_system;
pub mod ui_bridge;

// Re-export key public types/traits for easier use by the binary and plugins
pub use event::{Event, EventDispatcher, PluginLifecycleEvent};
pub use plugin_system::config::PluginSystemConfig;
pub use plugin_system::error::PluginSystemError;
pub use plugin_system::manager::PluginManager;
pub use plugin_system::manifest::PluginDescriptor;
pub use plugin_system::state::PluginState;
pub use plugin_system::traits::{HostContext, NetworkPlugin};
pub use ui_bridge::{UiBridgeManager, UiConnector};
