//! # NetVane Core Plugin System
//!
//! Discovery, dependency resolution and lifecycle control for host plugins.
//!
//! ## Submodules
//!
//! - `config`: tunable settings, loadable from TOML
//! - `dependency`: inter-plugin dependency declarations and the hard
//!   satisfaction check run before loading
//! - `error`: the plugin system error type
//! - `installer`: external package requirements, installed before load and
//!   removed after disable
//! - `lifecycle`: plugin handles, the state machine and teardown
//! - `loader`: instantiation from builtin factories or dynamic libraries
//! - `manager`: the orchestration facade
//! - `manifest`: `manifest.json` parsing and validation
//! - `registry`: durable plugin-state persistence
//! - `resolver`: dependency-ordered load sequencing
//! - `state`: the lifecycle state enum and its transition rules
//! - `traits`: the plugin contract and the host context handed to plugins
//! - `version`: lenient version parsing and minimum-version constraints

pub mod config;
pub mod dependency;
pub mod error;
pub mod installer;
pub mod lifecycle;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod resolver;
pub mod state;
pub mod traits;
pub mod version;

pub use config::PluginSystemConfig;
pub use dependency::{DependencyError, PluginDependency};
pub use error::{PluginSystemError, Result};
pub use installer::{PackageProvider, RequirementInstaller};
pub use lifecycle::{LifecycleController, PluginHandle};
pub use loader::{CodeUnit, PluginLoader};
pub use manager::PluginManager;
pub use manifest::{DiscoveryOrigin, PluginDescriptor, PluginRequirements};
pub use registry::PluginRegistry;
pub use state::PluginState;
pub use traits::{HostContext, NetworkPlugin};
pub use version::VersionConstraint;

// Test module declaration
#[cfg(test)]
mod tests;
