use std::process::Command;

use async_trait::async_trait;
use netvane_core::plugin_system::installer::PackageProvider;

/// Installs plugin requirements with `pip3`.
///
/// Every invocation runs on a blocking worker; the installer layer above
/// enforces timeouts, so calls here may take as long as pip takes.
pub struct PipPackageManager;

fn run_pip(args: &[&str]) -> Result<(), String> {
    let output = Command::new("pip3")
        .args(args)
        .output()
        .map_err(|e| format!("failed to run pip3: {e}"))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

#[async_trait]
impl PackageProvider for PipPackageManager {
    async fn install(&self, package: &str) -> Result<(), String> {
        let package = package.to_string();
        tokio::task::spawn_blocking(move || {
            run_pip(&["install", "--user", &package])
        })
        .await
        .map_err(|e| format!("install task failed: {e}"))?
    }

    async fn remove(&self, package: &str) -> Result<(), String> {
        let package = package.to_string();
        tokio::task::spawn_blocking(move || run_pip(&["uninstall", "-y", &package]))
            .await
            .map_err(|e| format!("removal task failed: {e}"))?
    }

    async fn is_installed(&self, package: &str) -> bool {
        let package = package.to_string();
        tokio::task::spawn_blocking(move || run_pip(&["show", "--quiet", &package]).is_ok())
            .await
            .unwrap_or(false)
    }
}
