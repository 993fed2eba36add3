use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tempfile::tempdir;

use crate::event::sync_handler;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::lifecycle::LifecycleController;
use crate::plugin_system::loader::{CodeUnit, LoadedPlugin};
use crate::plugin_system::manifest::{
    DiscoveryOrigin, PluginDescriptor, PluginRequirements,
};
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::state::PluginState;
use crate::plugin_system::tests::common::{PluginProbe, TestPlugin};

fn descriptor(id: &str) -> PluginDescriptor {
    PluginDescriptor {
        id: id.to_string(),
        name: id.to_string(),
        version: "1.0.0".to_string(),
        description: None,
        author: None,
        entry_point: format!("{id}-factory"),
        install_path: format!("/plugins/{id}").into(),
        min_app_version: None,
        max_app_version: None,
        dependencies: Vec::new(),
        requirements: PluginRequirements::default(),
        changelog: None,
        docs_missing: false,
        origin: DiscoveryOrigin::User,
    }
}

fn controller(registry_dir: &std::path::Path) -> LifecycleController {
    LifecycleController::new(PluginRegistry::new(registry_dir.join("registry.json")))
}

fn loaded_plugin(probe: Arc<PluginProbe>) -> LoadedPlugin {
    LoadedPlugin {
        instance: Box::new(TestPlugin::accepting(probe)),
        code_unit: CodeUnit::builtin(),
        subscriptions: Vec::new(),
    }
}

async fn adopt_enabled(controller: &mut LifecycleController, id: &str) {
    controller.registry_mut().load().await.unwrap();
    controller.registry_mut().reconcile(&[descriptor(id)]);
    controller.adopt(descriptor(id), PluginState::Enabled);
}

#[tokio::test]
async fn invalid_transition_is_rejected() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    controller.adopt(descriptor("p"), PluginState::Discovered);

    let err = controller
        .transition("p", PluginState::Loaded)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PluginSystemError::InvalidTransition {
            from: PluginState::Discovered,
            to: PluginState::Loaded,
            ..
        }
    ));
    assert_eq!(controller.state_of("p"), Some(PluginState::Discovered));
}

#[tokio::test]
async fn self_transition_is_a_no_op() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;

    controller.transition("p", PluginState::Enabled).await.unwrap();
    assert_eq!(controller.state_of("p"), Some(PluginState::Enabled));
}

#[tokio::test]
async fn unknown_plugin_is_reported() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    let err = controller
        .transition("ghost", PluginState::Enabled)
        .await
        .unwrap_err();
    assert!(matches!(err, PluginSystemError::PluginNotFound(_)));
}

#[tokio::test]
async fn commit_load_stores_instance_and_transitions() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;

    let probe = Arc::new(PluginProbe::default());
    controller
        .commit_load("p", loaded_plugin(Arc::clone(&probe)))
        .await
        .unwrap();

    assert_eq!(controller.state_of("p"), Some(PluginState::Loaded));
    assert!(controller.has_instance("p"));
    assert_eq!(controller.load_order(), ["p"]);
}

#[tokio::test]
async fn unload_tears_down_immediately() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;
    let probe = Arc::new(PluginProbe::default());
    controller
        .commit_load("p", loaded_plugin(Arc::clone(&probe)))
        .await
        .unwrap();

    controller.transition("p", PluginState::Enabled).await.unwrap();

    assert_eq!(probe.cleaned_up.load(Ordering::SeqCst), 1);
    assert!(!controller.has_instance("p"));
    assert!(controller.load_order().is_empty());
}

#[tokio::test]
async fn disabling_a_loaded_plugin_tears_down() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;
    let probe = Arc::new(PluginProbe::default());
    controller
        .commit_load("p", loaded_plugin(Arc::clone(&probe)))
        .await
        .unwrap();

    controller.transition("p", PluginState::Disabled).await.unwrap();

    assert_eq!(probe.cleaned_up.load(Ordering::SeqCst), 1);
    assert!(!controller.has_instance("p"));
    assert_eq!(controller.state_of("p"), Some(PluginState::Disabled));

    // Disabling again is a no-op; cleanup must not run twice.
    controller.transition("p", PluginState::Disabled).await.unwrap();
    assert_eq!(probe.cleaned_up.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_clears_the_instance_and_keeps_the_message() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;
    let probe = Arc::new(PluginProbe::default());
    controller
        .commit_load("p", loaded_plugin(Arc::clone(&probe)))
        .await
        .unwrap();

    controller.fail("p", "backend went away".to_string()).await.unwrap();

    assert_eq!(controller.state_of("p"), Some(PluginState::Error));
    assert!(!controller.has_instance("p"));
    assert_eq!(probe.cleaned_up.load(Ordering::SeqCst), 1);
    assert_eq!(
        controller.handle("p").unwrap().error.as_deref(),
        Some("backend went away")
    );
}

#[tokio::test]
async fn error_state_is_terminal_and_keeps_the_diagnostic() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;
    controller.fail("p", "boom".to_string()).await.unwrap();

    // Error is terminal for normal transitions.
    let err = controller
        .transition("p", PluginState::Enabled)
        .await
        .unwrap_err();
    assert!(matches!(err, PluginSystemError::InvalidTransition { .. }));
    assert_eq!(controller.handle("p").unwrap().error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn plugin_subscriptions_are_removed_on_unload() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;

    let probe = Arc::new(PluginProbe::default());
    let loaded = LoadedPlugin {
        instance: Box::new(TestPlugin::accepting(Arc::clone(&probe))),
        code_unit: CodeUnit::builtin(),
        subscriptions: vec![("plugin.state_changed".to_string(), sync_handler(|_| {}))],
    };
    controller.commit_load("p", loaded).await.unwrap();
    assert_eq!(controller.events_mut().handler_count("plugin.state_changed"), 1);

    controller.transition("p", PluginState::Enabled).await.unwrap();
    assert_eq!(controller.events_mut().handler_count("plugin.state_changed"), 0);
}

#[tokio::test]
async fn cleanup_panic_does_not_leak_the_handle() {
    struct PanickyPlugin;
    impl crate::plugin_system::traits::NetworkPlugin for PanickyPlugin {
        fn initialize(
            &mut self,
            _context: &mut crate::plugin_system::traits::HostContext,
            _descriptor: &PluginDescriptor,
        ) -> bool {
            true
        }
        fn cleanup(&mut self) {
            panic!("cleanup exploded");
        }
    }

    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;
    controller
        .commit_load(
            "p",
            LoadedPlugin {
                instance: Box::new(PanickyPlugin),
                code_unit: CodeUnit::builtin(),
                subscriptions: Vec::new(),
            },
        )
        .await
        .unwrap();

    controller.transition("p", PluginState::Disabled).await.unwrap();
    assert!(!controller.has_instance("p"));
    assert_eq!(controller.state_of("p"), Some(PluginState::Disabled));
}

#[tokio::test]
async fn transitions_emit_discrete_and_generic_events() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    for name in ["plugin.loaded", "plugin.unloaded", "plugin.state_changed"] {
        let log = Arc::clone(&seen);
        controller
            .events_mut()
            .subscribe(name, sync_handler(move |event| {
                log.lock().unwrap().push(event.name().to_string());
            }));
    }

    let probe = Arc::new(PluginProbe::default());
    controller
        .commit_load("p", loaded_plugin(Arc::clone(&probe)))
        .await
        .unwrap();
    controller.transition("p", PluginState::Enabled).await.unwrap();

    let events = seen.lock().unwrap().clone();
    assert_eq!(
        events,
        [
            "plugin.state_changed",
            "plugin.loaded",
            "plugin.state_changed",
            "plugin.unloaded"
        ]
    );
}

#[tokio::test]
async fn disabling_a_loaded_plugin_emits_unloaded_and_disabled() {
    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    for name in ["plugin.unloaded", "plugin.disabled"] {
        let log = Arc::clone(&seen);
        controller
            .events_mut()
            .subscribe(name, sync_handler(move |event| {
                log.lock().unwrap().push(event.name().to_string());
            }));
    }

    let probe = Arc::new(PluginProbe::default());
    controller
        .commit_load("p", loaded_plugin(Arc::clone(&probe)))
        .await
        .unwrap();
    controller.transition("p", PluginState::Disabled).await.unwrap();

    let events = seen.lock().unwrap().clone();
    assert_eq!(events, ["plugin.unloaded", "plugin.disabled"]);
}

#[tokio::test]
async fn state_changes_are_persisted() {
    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("registry.json");
    {
        let mut controller =
            LifecycleController::new(PluginRegistry::new(&registry_path));
        adopt_enabled(&mut controller, "p").await;
        controller.transition("p", PluginState::Disabled).await.unwrap();
    }

    let mut reloaded = PluginRegistry::new(&registry_path);
    reloaded.load().await.unwrap();
    assert_eq!(reloaded.states()["p"], PluginState::Disabled);
}

/// Counts live instances; pairs with a drop-order check on the handle.
struct DropTracker(Arc<AtomicUsize>);
impl Drop for DropTracker {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn retire_tears_down_live_plugins() {
    struct TrackedPlugin(#[allow(dead_code)] DropTracker);
    impl crate::plugin_system::traits::NetworkPlugin for TrackedPlugin {
        fn initialize(
            &mut self,
            _context: &mut crate::plugin_system::traits::HostContext,
            _descriptor: &PluginDescriptor,
        ) -> bool {
            true
        }
        fn cleanup(&mut self) {}
    }

    let dir = tempdir().unwrap();
    let mut controller = controller(dir.path());
    adopt_enabled(&mut controller, "p").await;
    let drops = Arc::new(AtomicUsize::new(0));
    controller
        .commit_load(
            "p",
            LoadedPlugin {
                instance: Box::new(TrackedPlugin(DropTracker(Arc::clone(&drops)))),
                code_unit: CodeUnit::builtin(),
                subscriptions: Vec::new(),
            },
        )
        .await
        .unwrap();

    controller.retire("p").await;

    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(controller.state_of("p"), None);
    assert!(controller.load_order().is_empty());
}
