use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use semver::Version;
use tokio::fs;

use crate::event::PluginLifecycleEvent;
use crate::plugin_system::config::PluginSystemConfig;
use crate::plugin_system::dependency::ensure_satisfied;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::installer::{PackageProvider, RequirementInstaller};
use crate::plugin_system::lifecycle::{LifecycleController, PluginHandle};
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::manifest::{
    DiscoveryOrigin, PluginDescriptor, load_descriptor,
};
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::resolver::topological_order;
use crate::plugin_system::state::PluginState;
use crate::plugin_system::traits::HostContext;
use crate::plugin_system::version::host_compatible;

/// Facade over discovery, loading and lifecycle control.
///
/// Batch operations (`discover`, `load_all`, `unload_all`) tolerate
/// individual failures: a plugin that fails to parse, resolve or load is
/// logged or moved to `Error` and the rest of the batch continues.
#[derive(Debug)]
pub struct PluginManager {
    host_version: Version,
    config: PluginSystemConfig,
    bundled_dir: PathBuf,
    lifecycle: LifecycleController,
    loader: PluginLoader,
    installer: RequirementInstaller,
}

impl PluginManager {
    pub fn new(
        host_version: Version,
        bundled_dir: impl Into<PathBuf>,
        config: PluginSystemConfig,
        provider: Arc<dyn PackageProvider>,
    ) -> Self {
        let registry = PluginRegistry::new(config.data_dir.join(&config.registry_file));
        let loader = PluginLoader::new(config.load_timeout());
        let installer =
            RequirementInstaller::new(provider, config.install_timeout(), config.poll_interval());
        Self {
            host_version,
            config,
            bundled_dir: bundled_dir.into(),
            lifecycle: LifecycleController::new(registry),
            loader,
            installer,
        }
    }

    /// Scan every plugin directory, reconcile with the registry and
    /// register handles. Returns how many plugins are registered after
    /// the scan. Individual bad manifests are skipped with a log entry.
    pub async fn discover(&mut self) -> Result<usize> {
        let mut directories: Vec<(PathBuf, DiscoveryOrigin)> = vec![
            (self.bundled_dir.clone(), DiscoveryOrigin::Bundled),
            (self.config.user_plugin_dir.clone(), DiscoveryOrigin::User),
        ];
        if let Some(dir) = &self.config.workspace_plugin_dir {
            directories.push((dir.clone(), DiscoveryOrigin::Workspace));
        }

        let mut descriptors: Vec<PluginDescriptor> = Vec::new();
        let mut seen: HashMap<String, DiscoveryOrigin> = HashMap::new();

        for (directory, origin) in directories {
            for descriptor in self.scan_directory(&directory, origin).await {
                if let Some(first_origin) = seen.get(&descriptor.id) {
                    log::warn!(
                        "Duplicate plugin id '{}' in {} directory ignored; first registered from {}",
                        descriptor.id,
                        origin.as_str(),
                        first_origin.as_str()
                    );
                    continue;
                }
                seen.insert(descriptor.id.clone(), origin);
                descriptors.push(descriptor);
            }
        }

        let registry = self.lifecycle.registry_mut();
        registry.load().await?;
        registry.reconcile(&descriptors);
        let persisted = registry.states();

        // Retire handles whose plugin vanished from disk.
        let vanished: Vec<String> = self
            .lifecycle
            .handles()
            .map(|h| h.descriptor.id.clone())
            .filter(|id| !seen.contains_key(id))
            .collect();
        for id in vanished {
            log::info!("Plugin '{id}' no longer on disk, retiring");
            self.lifecycle.retire(&id).await;
        }

        let mut newly_discovered = Vec::new();
        for descriptor in descriptors {
            let id = descriptor.id.clone();
            let state = persisted
                .get(&id)
                .copied()
                .unwrap_or(PluginState::Discovered);
            let is_new = self.lifecycle.state_of(&id).is_none();
            self.lifecycle.adopt(descriptor, state);
            if is_new && state == PluginState::Discovered {
                newly_discovered.push(id);
            }
        }
        for id in newly_discovered {
            self.lifecycle
                .emit(PluginLifecycleEvent::Discovered { plugin_id: id })
                .await;
        }

        // Reconcile works from the manifest set alone; a mid-session
        // rediscovery must not let the file drift from live handle state
        // (a loaded plugin stays loaded, an errored one stays errored).
        let live: Vec<(String, PluginState)> = self
            .lifecycle
            .handles()
            .map(|h| (h.descriptor.id.clone(), h.state))
            .collect();
        let registry = self.lifecycle.registry_mut();
        for (id, state) in live {
            if registry.get(&id).map(|entry| entry.state) != Some(state) {
                registry.record(&id, state);
            }
        }
        registry.sync().await?;

        let count = self.lifecycle.handles().count();
        log::info!("Discovery complete: {count} plugin(s) registered");
        Ok(count)
    }

    /// Read every `*/manifest.json` under one plugin directory. Returns
    /// the descriptors that parsed and passed the host-version check.
    async fn scan_directory(
        &self,
        directory: &Path,
        origin: DiscoveryOrigin,
    ) -> Vec<PluginDescriptor> {
        let mut entries = match fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                log::warn!(
                    "Cannot scan {} plugin directory {}: {e}",
                    origin.as_str(),
                    directory.display()
                );
                return Vec::new();
            }
        };

        let mut descriptors = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Error reading {}: {e}", directory.display());
                    break;
                }
            };

            let manifest_path = entry.path().join("manifest.json");
            if !fs::try_exists(&manifest_path).await.unwrap_or(false) {
                continue;
            }

            let descriptor = match load_descriptor(&manifest_path, origin).await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    log::warn!("Skipping {}: {e}", manifest_path.display());
                    continue;
                }
            };

            if !host_compatible(
                &self.host_version,
                descriptor.min_app_version.as_deref(),
                descriptor.max_app_version.as_deref(),
            ) {
                log::warn!(
                    "Plugin '{}' v{} is not compatible with host v{}, skipping",
                    descriptor.id,
                    descriptor.version,
                    self.host_version
                );
                continue;
            }

            descriptors.push(descriptor);
        }
        descriptors
    }

    /// Enable what should be auto-enabled, then load every enabled plugin
    /// in dependency order. Returns how many plugins loaded. Failures are
    /// per-plugin; the batch always runs to completion.
    pub async fn load_all(&mut self) -> usize {
        let auto_enable: Vec<String> = self
            .lifecycle
            .handles()
            .filter(|h| {
                h.state == PluginState::Discovered
                    && (h.descriptor.origin == DiscoveryOrigin::Bundled
                        || self.config.auto_enable_new)
            })
            .map(|h| h.descriptor.id.clone())
            .collect();
        for id in auto_enable {
            if let Err(e) = self.lifecycle.transition(&id, PluginState::Enabled).await {
                log::warn!("Auto-enable of '{id}' failed: {e}");
            }
        }

        let graph: HashMap<String, Vec<String>> = self
            .lifecycle
            .handles()
            .filter(|h| h.state == PluginState::Enabled)
            .map(|h| {
                (
                    h.descriptor.id.clone(),
                    h.descriptor
                        .dependencies
                        .iter()
                        .map(|d| d.plugin_id.clone())
                        .collect(),
                )
            })
            .collect();

        let order = topological_order(&graph);
        let mut loaded = 0usize;
        for id in order {
            match self.load_plugin(&id).await {
                Ok(()) => loaded += 1,
                Err(e) => log::warn!("Plugin '{id}' failed to load: {e}"),
            }
        }
        log::info!("Loaded {loaded} plugin(s)");
        loaded
    }

    /// Load one enabled plugin: check dependencies, install requirements,
    /// instantiate and commit. Already-loaded plugins are a no-op.
    pub async fn load_plugin(&mut self, plugin_id: &str) -> Result<()> {
        let state = self
            .lifecycle
            .state_of(plugin_id)
            .ok_or_else(|| PluginSystemError::PluginNotFound(plugin_id.to_string()))?;
        if state == PluginState::Loaded {
            return Ok(());
        }
        if state != PluginState::Enabled {
            return Err(PluginSystemError::NotEnabled {
                plugin_id: plugin_id.to_string(),
            });
        }

        let descriptor = self
            .lifecycle
            .handle(plugin_id)
            .map(|h| h.descriptor.clone())
            .ok_or_else(|| PluginSystemError::PluginNotFound(plugin_id.to_string()))?;

        // Unsatisfied dependencies leave the plugin Enabled; the situation
        // may fix itself when the missing dependency is enabled.
        if let Err(e) = ensure_satisfied(&descriptor.dependencies, &self.lifecycle.dependency_view())
        {
            return Err(PluginSystemError::DependencyUnsatisfied {
                plugin_id: plugin_id.to_string(),
                source: e,
            });
        }

        if let Err(e) = self.installer.install(&descriptor).await {
            let message = e.to_string();
            self.lifecycle.fail(plugin_id, message).await?;
            return Err(e);
        }

        let context = HostContext::new(
            self.host_version.clone(),
            self.config.data_dir.join(&descriptor.id),
        );
        match self.loader.load(&descriptor, context).await {
            Ok(loaded) => self.lifecycle.commit_load(plugin_id, loaded).await,
            Err(e) => {
                let message = e.to_string();
                self.lifecycle.fail(plugin_id, message).await?;
                Err(e)
            }
        }
    }

    /// Unload one plugin back to `Enabled`. Not-loaded plugins are a no-op.
    pub async fn unload_plugin(&mut self, plugin_id: &str) -> Result<()> {
        match self.lifecycle.state_of(plugin_id) {
            None => Err(PluginSystemError::PluginNotFound(plugin_id.to_string())),
            Some(PluginState::Loaded) => {
                self.lifecycle.transition(plugin_id, PluginState::Enabled).await
            }
            Some(_) => Ok(()),
        }
    }

    /// Unload every loaded plugin, most recently loaded first.
    pub async fn unload_all(&mut self) {
        let order: Vec<String> = self.lifecycle.load_order().iter().rev().cloned().collect();
        for id in order {
            if let Err(e) = self.unload_plugin(&id).await {
                log::warn!("Unload of '{id}' failed: {e}");
            }
        }
    }

    /// Mark a plugin eligible for loading. Enabling an enabled or loaded
    /// plugin is a no-op.
    pub async fn enable_plugin(&mut self, plugin_id: &str) -> Result<()> {
        self.lifecycle.transition(plugin_id, PluginState::Enabled).await
    }

    /// Disable a plugin, tearing down its instance if loaded, then remove
    /// requirement packages no other enabled plugin still needs.
    pub async fn disable_plugin(&mut self, plugin_id: &str) -> Result<()> {
        self.lifecycle
            .transition(plugin_id, PluginState::Disabled)
            .await?;

        let descriptor = match self.lifecycle.handle(plugin_id) {
            Some(handle) => handle.descriptor.clone(),
            None => return Ok(()),
        };

        let mut shared: std::collections::HashSet<String> = std::collections::HashSet::new();
        for handle in self.lifecycle.handles() {
            if handle.descriptor.id != plugin_id && handle.state.is_enabled() {
                shared.extend(
                    handle
                        .descriptor
                        .requirements
                        .platform_packages
                        .iter()
                        .cloned(),
                );
            }
        }
        self.installer
            .uninstall(&descriptor, |package| shared.contains(package))
            .await;
        Ok(())
    }

    /// Unload and, if the plugin settles back in `Enabled`, load again.
    pub async fn reload_plugin(&mut self, plugin_id: &str) -> Result<()> {
        self.unload_plugin(plugin_id).await?;
        if self.lifecycle.state_of(plugin_id) == Some(PluginState::Enabled) {
            self.load_plugin(plugin_id).await?;
        }
        Ok(())
    }

    /// Current state of every registered plugin.
    pub fn plugin_states(&self) -> HashMap<String, PluginState> {
        self.lifecycle
            .handles()
            .map(|h| (h.descriptor.id.clone(), h.state))
            .collect()
    }

    pub fn descriptor(&self, plugin_id: &str) -> Option<&PluginDescriptor> {
        self.lifecycle.handle(plugin_id).map(|h| &h.descriptor)
    }

    /// Diagnostic from the plugin's most recent failure, if it is in
    /// the error state.
    pub fn last_error(&self, plugin_id: &str) -> Option<&str> {
        self.lifecycle
            .handle(plugin_id)
            .and_then(|h| h.error.as_deref())
    }

    pub fn handle(&self, plugin_id: &str) -> Option<&PluginHandle> {
        self.lifecycle.handle(plugin_id)
    }

    pub fn loader_mut(&mut self) -> &mut PluginLoader {
        &mut self.loader
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut LifecycleController {
        &mut self.lifecycle
    }
}
