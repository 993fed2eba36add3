use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crate::event::{EventDispatcher, PluginLifecycleEvent, SubscriptionId};
use crate::plugin_system::dependency::DependencyView;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::loader::{CodeUnit, LoadedPlugin, panic_message};
use crate::plugin_system::manifest::PluginDescriptor;
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::state::PluginState;
use crate::plugin_system::traits::NetworkPlugin;
use crate::ui_bridge::UiBridgeManager;

/// Everything the system holds for one registered plugin.
///
/// Field order matters for teardown-by-drop: `instance` precedes
/// `code_unit`, so the instance is destroyed before the library that
/// contains its code is unmapped.
pub struct PluginHandle {
    pub descriptor: PluginDescriptor,
    pub state: PluginState,
    /// Diagnostic from the most recent failure, kept while in `Error`.
    pub error: Option<String>,
    instance: Option<Box<dyn NetworkPlugin>>,
    code_unit: Option<CodeUnit>,
    subscriptions: Vec<SubscriptionId>,
}

impl PluginHandle {
    fn new(descriptor: PluginDescriptor, state: PluginState) -> Self {
        Self {
            descriptor,
            state,
            error: None,
            instance: None,
            code_unit: None,
            subscriptions: Vec::new(),
        }
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    pub fn instance(&self) -> Option<&dyn NetworkPlugin> {
        self.instance.as_deref()
    }

    pub fn instance_mut(&mut self) -> Option<&mut Box<dyn NetworkPlugin>> {
        self.instance.as_mut()
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("id", &self.descriptor.id)
            .field("state", &self.state)
            .field("has_instance", &self.instance.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// Owns the plugin handles and enforces the state machine.
///
/// Every state change funnels through [`transition`](Self::transition),
/// which validates the move, tears down the instance when required,
/// records the result in the registry and emits lifecycle events.
#[derive(Debug)]
pub struct LifecycleController {
    plugins: HashMap<String, PluginHandle>,
    registry: PluginRegistry,
    events: EventDispatcher,
    ui: UiBridgeManager,
    /// Successful load order, consumed in reverse by unload-all.
    load_order: Vec<String>,
}

impl LifecycleController {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            plugins: HashMap::new(),
            registry,
            events: EventDispatcher::new(),
            ui: UiBridgeManager::new(),
            load_order: Vec::new(),
        }
    }

    /// Move a plugin to `target`, running teardown when the move releases
    /// the instance. A transition to the current state is a no-op.
    pub async fn transition(&mut self, plugin_id: &str, target: PluginState) -> Result<()> {
        let handle = self
            .plugins
            .get_mut(plugin_id)
            .ok_or_else(|| PluginSystemError::PluginNotFound(plugin_id.to_string()))?;

        let from = handle.state;
        if from == target {
            return Ok(());
        }
        if !from.can_transition_to(target) {
            return Err(PluginSystemError::InvalidTransition {
                plugin_id: plugin_id.to_string(),
                from,
                to: target,
            });
        }

        if from.releases_instance(target) {
            Self::teardown(&mut self.ui, &mut self.events, handle).await;
            self.load_order.retain(|id| id != plugin_id);
        }

        handle.state = target;
        if target != PluginState::Error {
            handle.error = None;
        }
        self.registry.record(plugin_id, target);
        log::info!("Plugin '{plugin_id}': {from} -> {target}");

        self.emit(PluginLifecycleEvent::StateChanged {
            plugin_id: plugin_id.to_string(),
            from,
            to: target,
        })
        .await;
        for event in discrete_events(plugin_id, from, target) {
            self.emit(event).await;
        }

        self.registry.sync().await?;
        Ok(())
    }

    /// Record a failure diagnostic and move the plugin to `Error`.
    pub async fn fail(&mut self, plugin_id: &str, message: String) -> Result<()> {
        log::error!("Plugin '{plugin_id}' failed: {message}");
        if let Some(handle) = self.plugins.get_mut(plugin_id) {
            handle.error = Some(message);
        }
        self.transition(plugin_id, PluginState::Error).await
    }

    /// Store a freshly loaded instance on its handle and transition to
    /// `Loaded`. Subscriptions collected during initialization are
    /// committed to the dispatcher here.
    pub(crate) async fn commit_load(&mut self, plugin_id: &str, loaded: LoadedPlugin) -> Result<()> {
        let sub_ids: Vec<SubscriptionId> = loaded
            .subscriptions
            .into_iter()
            .map(|(event_name, handler)| self.events.subscribe(&event_name, handler))
            .collect();

        let handle = self
            .plugins
            .get_mut(plugin_id)
            .ok_or_else(|| PluginSystemError::PluginNotFound(plugin_id.to_string()))?;
        handle.instance = Some(loaded.instance);
        handle.code_unit = Some(loaded.code_unit);
        handle.subscriptions = sub_ids;
        self.load_order.push(plugin_id.to_string());

        self.transition(plugin_id, PluginState::Loaded).await
    }

    /// Release everything a plugin acquired: UI components, event
    /// subscriptions, the instance itself and its code unit, in that
    /// order. Best-effort throughout; a plugin that panics in `cleanup`
    /// still gets fully released.
    async fn teardown(
        ui: &mut UiBridgeManager,
        events: &mut EventDispatcher,
        handle: &mut PluginHandle,
    ) {
        let plugin_id = handle.descriptor.id.clone();

        ui.deregister_plugin_components(&plugin_id);

        for sub_id in handle.subscriptions.drain(..) {
            if !events.unsubscribe(sub_id) {
                log::debug!("Subscription {sub_id} of '{plugin_id}' was already removed");
            }
        }

        if let Some(mut instance) = handle.instance.take() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| instance.cleanup()));
            if let Err(payload) = outcome {
                log::warn!(
                    "Plugin '{plugin_id}' panicked during cleanup: {}",
                    panic_message(payload)
                );
            }
            drop(instance);
        }

        // Instance is gone; now the code behind it may be unmapped.
        handle.code_unit = None;
    }

    /// Register a handle for a discovered plugin. An existing handle keeps
    /// its instance and state; only the descriptor is refreshed.
    pub(crate) fn adopt(&mut self, descriptor: PluginDescriptor, state: PluginState) {
        match self.plugins.get_mut(&descriptor.id) {
            Some(handle) => {
                handle.descriptor = descriptor;
            }
            None => {
                self.plugins.insert(
                    descriptor.id.clone(),
                    PluginHandle::new(descriptor, state),
                );
            }
        }
    }

    /// Drop the handle of a plugin that vanished from disk, tearing down
    /// any live instance first.
    pub(crate) async fn retire(&mut self, plugin_id: &str) {
        if let Some(mut handle) = self.plugins.remove(plugin_id) {
            if handle.has_instance() {
                log::warn!("Retiring plugin '{plugin_id}' while loaded");
                Self::teardown(&mut self.ui, &mut self.events, &mut handle).await;
            }
            self.load_order.retain(|id| id != plugin_id);
        }
    }

    /// Dependency-checking view over every registered plugin.
    pub fn dependency_view(&self) -> HashMap<String, DependencyView> {
        self.plugins
            .iter()
            .map(|(id, handle)| {
                (
                    id.clone(),
                    DependencyView {
                        state: handle.state,
                        version: handle.descriptor.version.clone(),
                    },
                )
            })
            .collect()
    }

    pub async fn emit(&self, event: PluginLifecycleEvent) {
        self.events.dispatch(&event).await;
    }

    pub fn state_of(&self, plugin_id: &str) -> Option<PluginState> {
        self.plugins.get(plugin_id).map(|h| h.state)
    }

    pub fn has_instance(&self, plugin_id: &str) -> bool {
        self.plugins
            .get(plugin_id)
            .is_some_and(PluginHandle::has_instance)
    }

    pub fn handle(&self, plugin_id: &str) -> Option<&PluginHandle> {
        self.plugins.get(plugin_id)
    }

    pub fn handles(&self) -> impl Iterator<Item = &PluginHandle> {
        self.plugins.values()
    }

    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    pub fn events_mut(&mut self) -> &mut EventDispatcher {
        &mut self.events
    }

    pub fn ui_mut(&mut self) -> &mut UiBridgeManager {
        &mut self.ui
    }
}

/// Map a transition onto the discrete events it implies. Disabling a
/// loaded plugin is both an unload and a disable, so both fire.
fn discrete_events(
    plugin_id: &str,
    from: PluginState,
    to: PluginState,
) -> Vec<PluginLifecycleEvent> {
    let id = |s: &str| s.to_string();
    let mut events = Vec::new();
    if to == PluginState::Loaded {
        events.push(PluginLifecycleEvent::Loaded {
            plugin_id: id(plugin_id),
        });
    }
    if from == PluginState::Loaded && to != PluginState::Loaded {
        events.push(PluginLifecycleEvent::Unloaded {
            plugin_id: id(plugin_id),
        });
    }
    match to {
        PluginState::Enabled if matches!(from, PluginState::Discovered | PluginState::Disabled) => {
            events.push(PluginLifecycleEvent::Enabled {
                plugin_id: id(plugin_id),
            });
        }
        PluginState::Disabled => {
            events.push(PluginLifecycleEvent::Disabled {
                plugin_id: id(plugin_id),
            });
        }
        _ => {}
    }
    events
}
