use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use libloading::Library;

use crate::event::EventHandler;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::manifest::PluginDescriptor;
use crate::plugin_system::traits::{HostContext, NetworkPlugin};

/// Factory producing a plugin instance. Builtins register one of these
/// under their entry-point name.
pub type PluginConstructor = Arc<dyn Fn() -> Box<dyn NetworkPlugin> + Send + Sync>;

/// Symbol every dynamic plugin library must export.
pub const PLUGIN_ENTRY_SYMBOL: &[u8] = b"netvane_plugin_entry\0";

/// Signature of the exported entry symbol.
type PluginEntryFn = unsafe fn() -> Box<dyn NetworkPlugin>;

/// Keeps a dynamic library mapped for as long as its plugin instance lives.
///
/// The instance must be dropped before this handle; dropping the handle
/// unmaps the code the instance's vtable points into.
pub struct CodeUnit {
    _library: Option<Library>,
}

impl CodeUnit {
    /// Handle for a builtin plugin; nothing to unmap.
    pub fn builtin() -> Self {
        Self { _library: None }
    }

    fn dynamic(library: Library) -> Self {
        Self {
            _library: Some(library),
        }
    }
}

impl std::fmt::Debug for CodeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeUnit")
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}

/// A successfully initialized plugin, ready to be committed to a handle.
pub struct LoadedPlugin {
    pub instance: Box<dyn NetworkPlugin>,
    pub code_unit: CodeUnit,
    pub subscriptions: Vec<(String, Box<dyn EventHandler>)>,
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("code_unit", &self.code_unit)
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

/// How a descriptor's entry point resolved.
enum ResolvedEntry {
    Builtin(PluginConstructor),
    Dynamic(Library, PluginEntryFn),
}

/// Instantiates plugins from factories or dynamic libraries.
///
/// Initialization runs on a blocking worker under a panic guard and a
/// timeout; a plugin that panics or hangs in `initialize` can fail its own
/// load but not take the host down with it.
pub struct PluginLoader {
    factories: HashMap<String, PluginConstructor>,
    load_timeout: Duration,
}

impl PluginLoader {
    pub fn new(load_timeout: Duration) -> Self {
        Self {
            factories: HashMap::new(),
            load_timeout,
        }
    }

    /// Register a constructor for a builtin plugin under its entry-point
    /// name. Re-registering a name replaces the previous factory.
    pub fn register_factory<F>(&mut self, entry_point: &str, factory: F)
    where
        F: Fn() -> Box<dyn NetworkPlugin> + Send + Sync + 'static,
    {
        self.factories
            .insert(entry_point.to_string(), Arc::new(factory));
    }

    pub fn has_factory(&self, entry_point: &str) -> bool {
        self.factories.contains_key(entry_point)
    }

    /// Instantiate and initialize the plugin described by `descriptor`.
    ///
    /// Entry points ending in a shared-library suffix are loaded from the
    /// plugin's install directory; anything else is looked up in the
    /// factory table. Work runs on a blocking worker; if the timeout
    /// elapses the worker is abandoned and the load reported failed.
    pub async fn load(
        &self,
        descriptor: &PluginDescriptor,
        mut context: HostContext,
    ) -> Result<LoadedPlugin> {
        let entry = self.resolve_entry(descriptor)?;
        let owned_descriptor = descriptor.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let (instance, accepted, code_unit) = match entry {
                ResolvedEntry::Builtin(make) => {
                    let (instance, accepted) =
                        instantiate_raw(|| make(), &mut context, &owned_descriptor)?;
                    (instance, accepted, CodeUnit::builtin())
                }
                ResolvedEntry::Dynamic(library, entry_fn) => {
                    // SAFETY: the symbol came from this library and the
                    // library handle outlives the call.
                    let (instance, accepted) = instantiate_raw(
                        || unsafe { entry_fn() },
                        &mut context,
                        &owned_descriptor,
                    )?;
                    (instance, accepted, CodeUnit::dynamic(library))
                }
            };
            Ok::<_, PluginSystemError>((instance, accepted, code_unit, context))
        });

        let joined = match tokio::time::timeout(self.load_timeout, handle).await {
            Ok(joined) => joined,
            Err(_elapsed) => {
                // The worker is abandoned, not cancelled; it finishes on
                // its own and its result is discarded.
                return Err(PluginSystemError::LoadTimeout {
                    plugin_id: descriptor.id.clone(),
                    timeout_secs: self.load_timeout.as_secs(),
                });
            }
        };

        let (instance, accepted, code_unit, mut context) =
            joined.map_err(|e| PluginSystemError::InitializeFailed {
                plugin_id: descriptor.id.clone(),
                message: format!("initialization task failed: {e}"),
            })??;

        if !accepted {
            return Err(PluginSystemError::InitializeRejected {
                plugin_id: descriptor.id.clone(),
            });
        }

        Ok(LoadedPlugin {
            instance,
            code_unit,
            subscriptions: context.take_subscriptions(),
        })
    }

    fn resolve_entry(&self, descriptor: &PluginDescriptor) -> Result<ResolvedEntry> {
        if is_library_path(&descriptor.entry_point) {
            let (library, entry_fn) = open_library(descriptor)?;
            return Ok(ResolvedEntry::Dynamic(library, entry_fn));
        }

        self.factories
            .get(&descriptor.entry_point)
            .cloned()
            .map(ResolvedEntry::Builtin)
            .ok_or_else(|| PluginSystemError::EntryPointMissing {
                plugin_id: descriptor.id.clone(),
                entry_point: descriptor.entry_point.clone(),
                message: "no factory registered under this name".to_string(),
            })
    }
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PluginLoader")
            .field("factories", &names)
            .field("load_timeout", &self.load_timeout)
            .finish()
    }
}

fn is_library_path(entry_point: &str) -> bool {
    entry_point.ends_with(".so")
        || entry_point.ends_with(".dll")
        || entry_point.ends_with(".dylib")
}

/// Dynamic entry points must stay inside the plugin's install directory.
fn validate_library_path(descriptor: &PluginDescriptor) -> Result<()> {
    let relative = Path::new(&descriptor.entry_point);
    if relative.is_absolute()
        || relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(PluginSystemError::EntryPointMissing {
            plugin_id: descriptor.id.clone(),
            entry_point: descriptor.entry_point.clone(),
            message: "library path must be relative and inside the plugin directory".to_string(),
        });
    }
    Ok(())
}

fn open_library(descriptor: &PluginDescriptor) -> Result<(Library, PluginEntryFn)> {
    validate_library_path(descriptor)?;
    let full_path = descriptor.install_path.join(&descriptor.entry_point);

    // SAFETY: loading plugin code is inherently trusted; the library path
    // is constrained to the plugin's own install directory.
    let library = unsafe { Library::new(&full_path) }.map_err(|e| {
        PluginSystemError::EntryPointMissing {
            plugin_id: descriptor.id.clone(),
            entry_point: descriptor.entry_point.clone(),
            message: format!("failed to load library {}: {e}", full_path.display()),
        }
    })?;

    // The fn pointer is copied out of the Symbol; it stays valid for as
    // long as the Library it came from is kept alive.
    let entry: PluginEntryFn = unsafe {
        *library
            .get::<PluginEntryFn>(PLUGIN_ENTRY_SYMBOL)
            .map_err(|e| PluginSystemError::EntryPointMissing {
                plugin_id: descriptor.id.clone(),
                entry_point: descriptor.entry_point.clone(),
                message: format!("missing entry symbol: {e}"),
            })?
    };

    Ok((library, entry))
}

/// Construct and initialize an instance under a panic guard. A panic in
/// either step is reported as an initialization failure; no partially
/// initialized instance escapes.
fn instantiate_raw(
    make: impl FnOnce() -> Box<dyn NetworkPlugin>,
    context: &mut HostContext,
    descriptor: &PluginDescriptor,
) -> Result<(Box<dyn NetworkPlugin>, bool)> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
        let mut instance = make();
        let accepted = instance.initialize(context, descriptor);
        (instance, accepted)
    }));

    match outcome {
        Ok((instance, accepted)) => Ok((instance, accepted)),
        Err(payload) => Err(PluginSystemError::InitializeFailed {
            plugin_id: descriptor.id.clone(),
            message: format!("panic during initialization: {}", panic_message(payload)),
        }),
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}
