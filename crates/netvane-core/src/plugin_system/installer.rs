use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::manifest::PluginDescriptor;

/// Backend that installs and removes platform packages on the host.
///
/// Implementations shell out to whatever package tooling the host uses.
/// Calls may block for a long time; the installer runs them on spawned
/// tasks and enforces its own timeout.
#[async_trait]
pub trait PackageProvider: Send + Sync {
    async fn install(&self, package: &str) -> std::result::Result<(), String>;
    async fn remove(&self, package: &str) -> std::result::Result<(), String>;
    async fn is_installed(&self, package: &str) -> bool;
}

/// Installs plugin requirements before load and removes them after disable.
///
/// Platform packages are installed through the [`PackageProvider`] when
/// absent and recorded per plugin so uninstall only removes what this
/// installer put there. System packages are presence-checked only; the
/// host never installs or removes them.
pub struct RequirementInstaller {
    provider: Arc<dyn PackageProvider>,
    install_timeout: Duration,
    poll_interval: Duration,
    /// Packages this installer installed, keyed by plugin id.
    installed: HashMap<String, Vec<String>>,
}

impl RequirementInstaller {
    pub fn new(
        provider: Arc<dyn PackageProvider>,
        install_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            provider,
            install_timeout,
            poll_interval,
            installed: HashMap::new(),
        }
    }

    /// Satisfy every requirement of the descriptor. Fails fast on the first
    /// missing system package or failed install; packages installed before
    /// the failure stay recorded so a later disable can remove them.
    pub async fn install(&mut self, descriptor: &PluginDescriptor) -> Result<()> {
        for package in &descriptor.requirements.system_packages {
            if !self.provider.is_installed(package).await {
                return Err(PluginSystemError::RequirementInstallFailed {
                    plugin_id: descriptor.id.clone(),
                    package: package.clone(),
                    message: "required system package is not installed".to_string(),
                });
            }
        }

        for package in &descriptor.requirements.platform_packages {
            if self.provider.is_installed(package).await {
                log::debug!(
                    "Requirement '{package}' for plugin '{}' already present",
                    descriptor.id
                );
                continue;
            }
            self.install_one(&descriptor.id, package).await?;
            self.installed
                .entry(descriptor.id.clone())
                .or_default()
                .push(package.clone());
        }

        Ok(())
    }

    /// Run one install on a spawned task, polling for completion until the
    /// deadline. On timeout the task handle is dropped and the install left
    /// to finish or fail on its own; there is no way to cancel a package
    /// manager halfway through safely.
    async fn install_one(&self, plugin_id: &str, package: &str) -> Result<()> {
        log::info!("Installing requirement '{package}' for plugin '{plugin_id}'");

        let provider = Arc::clone(&self.provider);
        let package_name = package.to_string();
        let task = tokio::spawn(async move { provider.install(&package_name).await });

        let deadline = Instant::now() + self.install_timeout;
        let result = loop {
            if task.is_finished() {
                break Some(task.await);
            }
            if Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        match result {
            None => Err(PluginSystemError::RequirementInstallTimeout {
                plugin_id: plugin_id.to_string(),
                package: package.to_string(),
                timeout_secs: self.install_timeout.as_secs(),
            }),
            Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(message))) => Err(PluginSystemError::RequirementInstallFailed {
                plugin_id: plugin_id.to_string(),
                package: package.to_string(),
                message,
            }),
            Some(Err(join_error)) => Err(PluginSystemError::RequirementInstallFailed {
                plugin_id: plugin_id.to_string(),
                package: package.to_string(),
                message: format!("install task failed: {join_error}"),
            }),
        }
    }

    /// Remove the packages recorded for a plugin, skipping any that another
    /// enabled plugin still requires. Removal failures are logged, never
    /// raised; disable must complete regardless.
    pub async fn uninstall(
        &mut self,
        descriptor: &PluginDescriptor,
        still_required: impl Fn(&str) -> bool,
    ) {
        let Some(packages) = self.installed.remove(&descriptor.id) else {
            return;
        };

        for package in packages {
            if still_required(&package) {
                log::debug!(
                    "Keeping '{package}': still required by another enabled plugin"
                );
                continue;
            }
            log::info!("Removing requirement '{package}' of plugin '{}'", descriptor.id);
            if let Err(message) = self.provider.remove(&package).await {
                log::warn!("Failed to remove package '{package}': {message}");
            }
        }
    }

    /// Packages recorded as installed for a plugin.
    pub fn installed_for(&self, plugin_id: &str) -> &[String] {
        self.installed
            .get(plugin_id)
            .map_or(&[], Vec::as_slice)
    }
}

impl std::fmt::Debug for RequirementInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequirementInstaller")
            .field("install_timeout", &self.install_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("installed", &self.installed)
            .finish()
    }
}
