use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ui_bridge::{UiBridgeError, UiBridgeManager, UiConnector};

struct CountingConnector {
    removals: Arc<AtomicUsize>,
    fail_toolbar: bool,
}

impl UiConnector for CountingConnector {
    fn name(&self) -> &str {
        "counting"
    }

    fn remove_toolbar_actions(&mut self, plugin_id: &str) -> Result<(), UiBridgeError> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        if self.fail_toolbar {
            return Err(UiBridgeError::RemovalFailed {
                connector: "counting".to_string(),
                plugin_id: plugin_id.to_string(),
                message: "toolbar backend unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn remove_dock_widgets(&mut self, _plugin_id: &str) -> Result<(), UiBridgeError> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn deregister_sweeps_every_connector() {
    let mut bridge = UiBridgeManager::new();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    bridge.register_connector(Box::new(CountingConnector {
        removals: Arc::clone(&first),
        fail_toolbar: false,
    }));
    bridge.register_connector(Box::new(CountingConnector {
        removals: Arc::clone(&second),
        fail_toolbar: false,
    }));

    bridge.deregister_plugin_components("scanner");

    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 2);
}

#[test]
fn connector_failure_does_not_stop_the_sweep() {
    let mut bridge = UiBridgeManager::new();
    let failing = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(AtomicUsize::new(0));
    bridge.register_connector(Box::new(CountingConnector {
        removals: Arc::clone(&failing),
        fail_toolbar: true,
    }));
    bridge.register_connector(Box::new(CountingConnector {
        removals: Arc::clone(&healthy),
        fail_toolbar: false,
    }));

    bridge.deregister_plugin_components("scanner");

    // Dock removal still ran on the failing connector, and the second
    // connector was still swept.
    assert_eq!(failing.load(Ordering::SeqCst), 2);
    assert_eq!(healthy.load(Ordering::SeqCst), 2);
}
