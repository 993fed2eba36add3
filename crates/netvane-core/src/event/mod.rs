//! # NetVane Core Event System
//!
//! Lifecycle notifications for the plugin system. The lifecycle controller
//! emits discrete events (loaded/unloaded, enabled/disabled and a generic
//! state-changed notification) which external collaborators, typically the
//! UI shell, consume to refresh their presentation.
//!
//! Plugins subscribe through their [`HostContext`](crate::plugin_system::traits::HostContext)
//! during initialization; every subscription is recorded by id so unload can
//! remove exactly what was registered, nothing more.
pub mod dispatcher;
pub mod types;

use std::any::Any;
use std::fmt;

use async_trait::async_trait;

/// Identifier handed out for every registered handler.
pub type SubscriptionId = u64;

/// Core event trait
pub trait Event: Any + fmt::Debug + Send + Sync {
    /// Get the name of this event
    fn name(&self) -> &'static str;

    /// Clone this event
    fn clone_event(&self) -> Box<dyn Event>;

    /// Cast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Asynchronous event handler trait
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &dyn Event);
}

pub use dispatcher::{EventDispatcher, sync_handler};
pub use types::PluginLifecycleEvent;
