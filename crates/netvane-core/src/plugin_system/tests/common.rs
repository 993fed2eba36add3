//! Shared fixtures for plugin system tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::event::sync_handler;
use crate::plugin_system::installer::PackageProvider;
use crate::plugin_system::manifest::PluginDescriptor;
use crate::plugin_system::traits::{HostContext, NetworkPlugin};

/// Observable hooks into a [`TestPlugin`]'s lifecycle.
#[derive(Default)]
pub struct PluginProbe {
    pub initialized: AtomicBool,
    pub cleaned_up: AtomicUsize,
}

/// Minimal plugin used across the suite. Can decline initialization,
/// panic in it, or register an event subscription.
pub struct TestPlugin {
    pub probe: Arc<PluginProbe>,
    pub accept: bool,
    pub panic_on_init: bool,
    pub subscribe_to: Option<String>,
}

impl TestPlugin {
    pub fn accepting(probe: Arc<PluginProbe>) -> Self {
        Self {
            probe,
            accept: true,
            panic_on_init: false,
            subscribe_to: None,
        }
    }
}

impl NetworkPlugin for TestPlugin {
    fn initialize(&mut self, context: &mut HostContext, _descriptor: &PluginDescriptor) -> bool {
        if self.panic_on_init {
            panic!("init exploded");
        }
        if let Some(event_name) = &self.subscribe_to {
            context.subscribe(event_name, sync_handler(|_| {}));
        }
        self.probe.initialized.store(true, Ordering::SeqCst);
        self.accept
    }

    fn cleanup(&mut self) {
        self.probe.cleaned_up.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory package provider with scriptable failures and delays.
pub struct MockProvider {
    pub present: Mutex<HashSet<String>>,
    pub fail: HashSet<String>,
    pub install_delay: Option<Duration>,
    pub installs: AtomicUsize,
    pub removals: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            present: Mutex::new(HashSet::new()),
            fail: HashSet::new(),
            install_delay: None,
            installs: AtomicUsize::new(0),
            removals: Mutex::new(Vec::new()),
        }
    }

    pub fn with_present(packages: &[&str]) -> Self {
        let provider = Self::new();
        {
            let mut present = provider.present.lock().unwrap();
            for p in packages {
                present.insert((*p).to_string());
            }
        }
        provider
    }
}

#[async_trait]
impl PackageProvider for MockProvider {
    async fn install(&self, package: &str) -> Result<(), String> {
        if let Some(delay) = self.install_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.contains(package) {
            return Err(format!("no candidate for '{package}'"));
        }
        self.installs.fetch_add(1, Ordering::SeqCst);
        self.present.lock().unwrap().insert(package.to_string());
        Ok(())
    }

    async fn remove(&self, package: &str) -> Result<(), String> {
        self.present.lock().unwrap().remove(package);
        self.removals.lock().unwrap().push(package.to_string());
        Ok(())
    }

    async fn is_installed(&self, package: &str) -> bool {
        self.present.lock().unwrap().contains(package)
    }
}

/// Write a plugin directory with a manifest under `root`, returning the
/// manifest path.
pub fn write_manifest(root: &Path, dir_name: &str, manifest: &str) -> std::path::PathBuf {
    let plugin_dir = root.join(dir_name);
    std::fs::create_dir_all(&plugin_dir).unwrap();
    let manifest_path = plugin_dir.join("manifest.json");
    std::fs::write(&manifest_path, manifest).unwrap();
    manifest_path
}

/// A well-formed manifest body with the given id and extras spliced in.
/// `extras` must be either empty or a string of `"key": value,` pairs.
pub fn manifest_json(id: &str, extras: &str) -> String {
    format!(
        r#"{{
  "id": "{id}",
  "name": "{id} plugin",
  "version": "1.2.0",
  {extras}
  "entry_point": "{id}-factory"
}}"#
    )
}
